// Decodes every packet in a file (or a hex string) and prints what the relay
//  would see.
//
//   cargo run --example pktdump -- packet.bin
//   cargo run --example pktdump -- --hex 05050703080161
//
// Set RUST_LOG=ccnrelay=trace to watch the decoder.

use std::process::ExitCode;

use ccnrelay::{suite, Packet};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let bytes = match args.as_slice() {
        [flag, text] if flag == "--hex" => match hex::decode(text.trim()) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(%err, "Invalid hex input");
                return ExitCode::FAILURE;
            }
        },
        [path] => match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(%err, %path, "Could not read input");
                return ExitCode::FAILURE;
            }
        },
        _ => {
            eprintln!("usage: pktdump <file> | pktdump --hex <bytes>");
            return ExitCode::FAILURE;
        }
    };

    let mut offset = 0;
    while offset < bytes.len() {
        match suite::decode(&bytes[offset..]) {
            Ok((packet, consumed)) => {
                print_packet(offset, &packet);
                offset += consumed.max(1);
            }
            Err(err) => {
                error!(offset, %err, "Decoding stopped");
                return ExitCode::FAILURE;
            }
        }
    }
    info!(bytes = offset, "Done");
    ExitCode::SUCCESS
}

fn print_packet(offset: usize, packet: &Packet) {
    let control = packet.control();
    println!("@{offset} {} {:?} {}", packet.suite(), packet.kind(), packet.name());
    if let Some(chunk) = packet.name().chunk() {
        println!("  chunk          {chunk}");
    }
    if packet.is_interest() {
        println!("  scope          {:?}", control.scope);
        println!("  suffix bounds  {}..={}", control.min_suffix, control.max_suffix);
        println!("  answer origin  {}", control.answer_origin_kind);
        if let Some(nonce) = packet.nonce() {
            println!("  nonce          {}", hex::encode(nonce));
        }
        if let Some(lifetime) = control.interest_lifetime_ms {
            println!("  lifetime       {lifetime} ms");
        }
        if control.must_be_fresh {
            println!("  must be fresh");
        }
    } else {
        if let Some(freshness) = control.freshness_period_ms {
            println!("  freshness      {freshness} ms");
        }
        if let Some(last) = control.final_block_id {
            println!("  final block    {last}");
        }
        println!(
            "  payload        {} bytes",
            packet.payload().map_or(0, |p| p.len())
        );
    }
    if let Some(digest) = packet.publisher_digest() {
        println!("  publisher      {}", hex::encode(digest));
    }
    if let Some(hop) = control.hop_limit {
        println!("  hop limit      {hop}");
    }
    println!("  {} bytes: {}", packet.bytes().len(), hex::encode(packet.bytes()));
}
