use std::time::Duration;

use colored::*;

use crate::codec::Direction;
use crate::walker::WalkReport;

const MIB: f64 = 1_048_576.0;

/// Print the end-of-run summary to stdout.
pub fn print_summary(report: &WalkReport, direction: Direction, elapsed: Duration) {
    let (title, in_label, out_label) = match direction {
        Direction::Compress => ("📦 Compression summary", "Total original:   ", "Total compressed: "),
        Direction::Decompress => ("📦 Decompression summary", "Total compressed: ", "Total restored:   "),
    };

    println!("\n{}", title.bold().green());
    println!("{} {}", "Succeeded:        ".green(), report.succeeded);
    println!("{} {}", "Failed:           ".red(), report.failed());
    println!("{} {}", "Skipped:          ".yellow(), report.skipped.len());
    println!("{} {:.2} MB", in_label.blue(), report.bytes_in as f64 / MIB);
    println!("{} {:.2} MB", out_label.blue(), report.bytes_out as f64 / MIB);
    if report.bytes_in > 0 {
        let ratio = report.bytes_out as f64 / report.bytes_in as f64;
        println!("{} {:.2}%", "Overall ratio:    ".yellow(), ratio * 100.0);
    }
    let secs = elapsed.as_secs_f64();
    println!("{} {:.2} s", "Total time:       ".magenta(), secs);
    let throughput = (report.bytes_in as f64 / MIB) / secs.max(1e-9);
    println!("{} {:.2} MB/s", "Avg throughput:   ".cyan(), throughput);

    if !report.failures.is_empty() {
        println!("\n{}", "Failures:".bold().red());
        for failure in &report.failures {
            println!(
                "  {} [{}] {}",
                failure.path.display(),
                failure.error.kind().red(),
                failure.error
            );
        }
    }
}
