use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use vm::{ByteOrder, MachineConfig};

pub const USAGE: &str = "usage: vm-run [--entry <hex>] [--big-endian] [--dump] <code> <heap> [<code> <heap>...]";

#[derive(Debug)]
pub struct Args {
    pub config: MachineConfig,
    pub dump: bool,
    /// One (code image, heap image) pair per process, in pid order.
    pub images: Vec<(PathBuf, PathBuf)>,
}

impl Args {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
        let mut config = MachineConfig::default();
        let mut dump = false;
        let mut paths = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--entry" => {
                    let value = args.next().context("--entry needs an address")?;
                    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
                    config.entry_point = u16::from_str_radix(digits, 16)
                        .with_context(|| format!("bad entry address {value:?}"))?;
                }
                "--big-endian" => config.byte_order = ByteOrder::Big,
                "--dump" => dump = true,
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                path => paths.push(PathBuf::from(path)),
            }
        }

        if paths.is_empty() || paths.len() % 2 != 0 {
            bail!("expected code and heap images in pairs\n{USAGE}");
        }

        let images = paths
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        Ok(Args {
            config,
            dump,
            images,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn pairs_and_flags() {
        let args = parse(&["--entry", "0x3010", "a.obj", "a.heap", "--dump", "b.obj", "b.heap"]).unwrap();

        assert_eq!(args.config.entry_point, 0x3010);
        assert_eq!(args.config.byte_order, ByteOrder::Little);
        assert!(args.dump);
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.images[1].0, PathBuf::from("b.obj"));
    }

    #[test]
    fn big_endian_images() {
        let args = parse(&["--big-endian", "c", "h"]).unwrap();

        assert_eq!(args.config.byte_order, ByteOrder::Big);
    }

    #[test]
    fn unpaired_images_are_rejected() {
        assert!(parse(&["code.obj"]).is_err());
        assert!(parse(&[]).is_err());
        assert!(parse(&["--frobnicate", "c", "h"]).is_err());
        assert!(parse(&["--entry", "zz", "c", "h"]).is_err());
    }
}
