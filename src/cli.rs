/// Command-line argument parsing (SPEC_FULL.md §6).
///
/// `--wallet alias:pubkey[:color]` may be repeated to register wallets at
/// startup; `--hud`/`-hud` is a value-less flag selecting the presentational
/// HUD mode (absence selects daemon mode); `--help` prints usage and exits.
/// Unknown flags are a hard startup error (§7: argv parsing is one of the few
/// preconditions allowed to abort).
use tracing::warn;

use crate::errors::{WarchestError, WarchestResult};
use crate::hud::WalletSpec;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub wallets: Vec<WalletSpec>,
    pub hud: bool,
    pub help: bool,
}

pub const USAGE: &str = "\
warchest-hud [--wallet alias:pubkey[:color]]... [--hud | -hud] [--help]

  --wallet alias:pubkey[:color]   register a wallet to track (repeatable)
  --hud, -hud                     run in HUD mode instead of daemon mode
  --help                          print this message and exit
";

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> WarchestResult<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut iter = args.into_iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                parsed.help = true;
            }
            "--wallet" => {
                let value = iter.next().ok_or_else(|| {
                    WarchestError::invalid_argument("--wallet requires a value")
                })?;
                // A malformed --wallet entry is dropped with a warning rather
                // than aborting startup (§6); only "zero wallets resolved"
                // is a fatal precondition, checked once every arg is parsed.
                match parse_wallet_spec(&value) {
                    Ok(spec) => parsed.wallets.push(spec),
                    Err(e) => warn!(value, error = %e, "dropping malformed --wallet entry"),
                }
            }
            "--hud" | "-hud" => {
                parsed.hud = true;
            }
            other => {
                return Err(WarchestError::invalid_argument(format!(
                    "unrecognized argument {other}"
                )))
            }
        }
    }

    Ok(parsed)
}

fn parse_wallet_spec(raw: &str) -> WarchestResult<WalletSpec> {
    let mut parts = raw.splitn(3, ':');
    let alias = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WarchestError::invalid_argument(format!("--wallet {raw} missing alias")))?;
    let pubkey = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
        WarchestError::invalid_argument(format!("--wallet {raw} missing pubkey"))
    })?;
    let color = parts.next().map(str::to_string);

    if bs58::decode(pubkey).into_vec().is_err() {
        return Err(WarchestError::invalid_argument(format!(
            "--wallet {raw} has a non-base58 pubkey"
        )));
    }

    Ok(WalletSpec {
        alias: alias.to_string(),
        pubkey: pubkey.to_string(),
        color,
        wallet_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_wallet_and_hud_flags() {
        let parsed = parse_args(args(&[
            "--wallet",
            "alpha:11111111111111111111111111111111:red",
            "--hud",
        ]))
        .unwrap();
        assert_eq!(parsed.wallets.len(), 1);
        assert_eq!(parsed.wallets[0].alias, "alpha");
        assert_eq!(parsed.wallets[0].color.as_deref(), Some("red"));
        assert!(parsed.hud);
    }

    #[test]
    fn short_hud_alias_is_also_recognized() {
        let parsed = parse_args(args(&["-hud"])).unwrap();
        assert!(parsed.hud);
    }

    #[test]
    fn absence_of_hud_flag_means_daemon_mode() {
        let parsed = parse_args(args(&[])).unwrap();
        assert!(!parsed.hud);
    }

    #[test]
    fn wallet_without_color_is_fine() {
        let parsed = parse_args(args(&["--wallet", "alpha:11111111111111111111111111111111"]))
            .unwrap();
        assert!(parsed.wallets[0].color.is_none());
    }

    #[test]
    fn help_flag_short_circuits_other_parsing() {
        let parsed = parse_args(args(&["--help"])).unwrap();
        assert!(parsed.help);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse_args(args(&["--bogus"])).unwrap_err();
        assert_eq!(err.code(), "EINVAL");
    }

    #[test]
    fn malformed_wallet_spec_is_dropped_not_rejected() {
        let parsed = parse_args(args(&["--wallet", "alpha"])).unwrap();
        assert!(parsed.wallets.is_empty());
    }

    #[test]
    fn non_base58_pubkey_is_dropped_not_rejected() {
        let parsed = parse_args(args(&["--wallet", "alpha:not-valid-base58!!"])).unwrap();
        assert!(parsed.wallets.is_empty());
    }

    #[test]
    fn one_malformed_and_one_valid_wallet_keeps_the_valid_one() {
        let parsed = parse_args(args(&[
            "--wallet",
            "alpha",
            "--wallet",
            "beta:11111111111111111111111111111111",
        ]))
        .unwrap();
        assert_eq!(parsed.wallets.len(), 1);
        assert_eq!(parsed.wallets[0].alias, "beta");
    }

    #[test]
    fn missing_wallet_value_is_still_a_hard_error() {
        let err = parse_args(args(&["--wallet"])).unwrap_err();
        assert_eq!(err.code(), "EINVAL");
    }
}
