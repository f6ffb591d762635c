use anyhow::{bail, Context as _, Result};
use clap::{Arg, Command};
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;

use routerman::address::AddressInterval;
use routerman::slots::{compute_free_slots, AllocatedRange};
use tracing::warn;

/// One input line: `a.b.c.d-e.f.g.h`, `a.b.c.d/nn` or a single address.
/// A leading `!` marks an entry that is configured but disabled.
fn parse_allocated(line: &str) -> routerman::Result<AllocatedRange> {
    let (enabled, text) = match line.strip_prefix('!') {
        Some(rest) => (false, rest.trim()),
        None => (true, line),
    };
    Ok(AllocatedRange {
        interval: text.parse()?,
        enabled,
    })
}

fn main() -> Result<()> {
    routerman::logging::init();

    let matches = Command::new("Bandwidth Slot Calculator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Prints the free IPv4 address runs left between allocated ranges")
        .arg(
            Arg::new("bound")
                .long("bound")
                .help("Range slots are taken from, e.g. 192.168.0.1-192.168.0.254 or 192.168.0.0/24")
                .required(true),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .help("Address never handed out, usually the router's own")
                .value_parser(clap::value_parser!(Ipv4Addr)),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Fail on lines that are not ranges instead of skipping them")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("input")
                .help("File with one allocated range per line (default: stdin)")
                .required(false)
                .index(1),
        )
        .get_matches();

    let strict = matches.get_flag("strict");
    let bound: AddressInterval = matches
        .get_one::<String>("bound")
        .map(|s| s.parse::<AddressInterval>())
        .transpose()?
        .context("missing --bound")?;
    let exclude = matches.get_one::<Ipv4Addr>("exclude").map(|ip| u32::from(*ip));

    let mut input: Box<dyn BufRead> = match matches.get_one::<String>("input") {
        Some(file) => Box::new(io::BufReader::new(
            std::fs::File::open(file).with_context(|| format!("opening {file}"))?,
        )),
        None => Box::new(io::BufReader::new(io::stdin())),
    };

    let mut allocated = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(line_no, "skipping non-utf8 line");
            continue;
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_allocated(line) {
            Ok(range) => allocated.push(range),
            Err(e) if strict => bail!("line {line_no}: {e}"),
            Err(e) => warn!(line_no, error = %e, "skipping line"),
        }
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    for slot in compute_free_slots(bound, exclude, &allocated) {
        writeln!(out, "{slot}")?;
    }
    out.flush()?;

    Ok(())
}
