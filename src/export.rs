//! CSV dumps of router-side MAC/IP tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::address::ip_to_int;
use crate::error::{Error, Result};
use crate::router::ClientReservation;

pub const BINDINGS_FILE: &str = "bindings.csv";
pub const RESERVATIONS_FILE: &str = "reservations.csv";

/// Write `Mac,IP,Enabled` rows ordered by address.
pub fn write_csv<W: Write>(out: &mut W, rows: &[ClientReservation]) -> Result<()> {
    let mut sorted: Vec<&ClientReservation> = rows.iter().collect();
    sorted.sort_by_key(|r| ip_to_int(r.ip));

    writeln!(out, "Mac,IP,Enabled")?;
    for r in sorted {
        let enabled = if r.enabled { "y" } else { "n" };
        writeln!(out, "{},{},{}", r.mac, r.ip, enabled)?;
    }
    Ok(())
}

/// Replace `path` with the CSV for `rows`; returns the row count.
pub fn export_to(path: &Path, rows: &[ClientReservation]) -> Result<usize> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    write_csv(&mut out, rows)?;
    out.flush().map_err(io_err)?;
    info!(path = %path.display(), rows = rows.len(), "exported csv");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn row(mac: &str, last: u8, enabled: bool) -> ClientReservation {
        ClientReservation {
            id: i64::from(last),
            mac: mac.parse().unwrap(),
            ip: Ipv4Addr::new(192, 168, 0, last),
            enabled,
        }
    }

    #[test]
    fn test_rows_sorted_numerically() {
        let rows = [
            row("aa-bb-cc-dd-ee-10", 100, true),
            row("AA:BB:CC:DD:EE:09", 9, false),
            row("AA:BB:CC:DD:EE:20", 20, true),
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Mac,IP,Enabled\n\
             AA:BB:CC:DD:EE:09,192.168.0.9,n\n\
             AA:BB:CC:DD:EE:20,192.168.0.20,y\n\
             AA:BB:CC:DD:EE:10,192.168.0.100,y\n"
        );
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BINDINGS_FILE);
        assert_eq!(export_to(&path, &[]).unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Mac,IP,Enabled\n");

        let missing = dir.path().join("nope").join(RESERVATIONS_FILE);
        assert!(matches!(export_to(&missing, &[]), Err(Error::Io { .. })));
    }
}
