use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pbsync", version)]
#[command(about = "Keep PocketBook booklists in line with the on-device catalog")]
pub struct Args {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, global = true, env = "PBSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reconcile without writing the booklist cache back
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sync the booklist of one volume and print it
    Books {
        /// List the storage card instead of main memory
        #[arg(long)]
        card: bool,
    },
    /// Find the profile of a reader by its USB identifiers
    Identify {
        /// Vendor ID, hexadecimal
        #[arg(long, value_parser = parse_hex)]
        vendor: u16,
        /// Product ID, hexadecimal
        #[arg(long, value_parser = parse_hex)]
        product: u16,
        /// Device release number, hexadecimal
        #[arg(long, value_parser = parse_hex)]
        bcd: Option<u16>,
        /// Vendor string reported by the device
        #[arg(long)]
        vendor_name: Option<String>,
    },
    /// List known reader models
    Profiles,
}

fn parse_hex(value: &str) -> Result<u16, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("{value:?} is not a 16-bit hex number: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_command_definition() {
        Args::command().debug_assert();
    }

    #[rstest]
    #[case("1f85", Some(0x1f85))]
    #[case("0x0525", Some(0x0525))]
    #[case("FFFE", Some(0xfffe))]
    #[case("10000", None)]
    #[case("pocket", None)]
    fn test_parse_hex(#[case] value: &str, #[case] expected: Option<u16>) {
        assert_eq!(parse_hex(value).ok(), expected);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["pbsync", "books", "--card", "--dry-run", "-v"]).unwrap();
        assert!(args.dry_run);
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Books { card: true }));
    }

    #[test]
    fn test_identify() {
        let args = Args::try_parse_from(["pbsync", "identify", "--vendor", "fffe", "--product", "0001"]).unwrap();
        match args.command {
            Command::Identify { vendor, product, bcd, vendor_name } => {
                assert_eq!((vendor, product, bcd, vendor_name), (0xfffe, 0x0001, None, None));
            },
            other => panic!("unexpected command {other:?}"),
        }
    }
}
