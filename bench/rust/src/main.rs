//! Report latency benchmark - measures report write to response read
//!
//! Line format copied from production crossing-central listener.rs

use clap::Parser;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "report-bench")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:7700")]
    addr: String,
    #[arg(short, long, default_value = "200")]
    trials: u32,
    #[arg(long, default_value = "20")]
    warmup: u32,
}

// From production listener.rs: one JSON report per line, one JSON answer per line
fn vehicle_line(plate: &str, event: &str) -> String {
    format!("{{\"kind\":\"vehicle\",\"plate\":\"{plate}\",\"event\":\"{event}\"}}\n")
}

async fn round_trip(
    writer: &mut OwnedWriteHalf,
    reader: &mut Lines<BufReader<OwnedReadHalf>>,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;

    let response = tokio::time::timeout(Duration::from_secs(5), reader.next_line())
        .await??
        .ok_or("listener closed the connection")?;

    Ok(response.contains("\"ok\":true"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Report Latency Benchmark");
    println!("========================");
    println!("Listener: {}", args.addr);
    println!("Trials: {} ({} warmup)", args.trials, args.warmup);
    println!();

    let stream = TcpStream::connect(&args.addr).await?;
    stream.set_nodelay(true)?;
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half).lines();
    println!("Connected");

    // Smoke test with a throwaway plate
    print!("Testing listener... ");
    let ok = round_trip(
        &mut writer,
        &mut reader,
        &vehicle_line("BENCH-SMOKE", "arriving"),
    )
    .await?;
    round_trip(&mut writer, &mut reader, &vehicle_line("BENCH-SMOKE", "left")).await?;
    if !ok {
        println!("FAILED");
        return Err("listener rejected the smoke report".into());
    }
    println!("OK");

    for i in 0..args.warmup {
        let plate = format!("WARM-{i:04}");
        round_trip(&mut writer, &mut reader, &vehicle_line(&plate, "arriving")).await?;
        round_trip(&mut writer, &mut reader, &vehicle_line(&plate, "left")).await?;
    }
    println!("Warmup done. Starting benchmark.\n");

    let mut results: Vec<u64> = vec![];
    let mut rejected = 0u32;

    for trial in 0..args.trials {
        let plate = format!("BENCH-{trial:04}");
        let line = vehicle_line(&plate, "arriving");

        // Timed: registration round trip
        let start = Instant::now();
        let ok = round_trip(&mut writer, &mut reader, &line).await?;
        let us = start.elapsed().as_micros() as u64;

        if ok {
            results.push(us);
        } else {
            rejected += 1;
        }

        // Untimed cleanup so the registry stays empty
        round_trip(&mut writer, &mut reader, &vehicle_line(&plate, "left")).await?;
    }

    // Stats
    println!("========================");
    println!("Results:");
    if !results.is_empty() {
        let sum: u64 = results.iter().sum();
        let avg = sum / results.len() as u64;
        let mut sorted = results.clone();
        sorted.sort();
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let p50 = sorted[sorted.len() / 2];
        let p95 = sorted[(sorted.len() as f64 * 0.95) as usize].min(max);
        let p99 = sorted[(sorted.len() as f64 * 0.99) as usize].min(max);

        println!("  Successful: {}/{}", results.len(), args.trials);
        if rejected > 0 {
            println!("  Rejected: {}", rejected);
        }
        println!("  Min: {} us", min);
        println!("  Max: {} us", max);
        println!("  Avg: {} us", avg);
        println!("  P50: {} us", p50);
        println!("  P95: {} us", p95);
        println!("  P99: {} us", p99);
    } else {
        println!("  No successful trials!");
    }

    Ok(())
}
