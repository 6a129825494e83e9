//! Parsing of composite command-line values.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use voxpatch_core::Platform;

/// A `--body ID[@PLATFORM]=PATH` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyArg {
    pub id: String,
    /// Slice the body is meant for; `None` means the image's primary one.
    pub platform: Option<Platform>,
    pub path: PathBuf,
}

/// Split an `ID[@PLATFORM]=PATH` body argument.
pub fn parse_body_arg(arg: &str) -> Result<BodyArg> {
    let Some((key, path)) = arg.split_once('=') else {
        bail!("Invalid body argument '{}': expected ID[@PLATFORM]=PATH", arg);
    };

    let (id, platform) = match key.split_once('@') {
        Some((id, platform)) => {
            let platform = Platform::from_str(platform.trim())
                .map_err(|_| anyhow!("Unknown platform '{}' in body argument '{}'", platform, arg))?;
            (id.trim(), Some(platform))
        }
        None => (key.trim(), None),
    };
    if id.is_empty() || path.is_empty() {
        bail!("Invalid body argument '{}': expected ID[@PLATFORM]=PATH", arg);
    }

    Ok(BodyArg {
        id: id.to_string(),
        platform,
        path: PathBuf::from(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_arg() {
        let body = parse_body_arg("HighpassCutoffFilter=bodies/hp.bin").unwrap();
        assert_eq!(body.id, "HighpassCutoffFilter");
        assert_eq!(body.platform, None);
        assert_eq!(body.path, PathBuf::from("bodies/hp.bin"));
    }

    #[test]
    fn test_parse_body_arg_keeps_equals_in_path() {
        let body = parse_body_arg("DcReject=a=b.bin").unwrap();
        assert_eq!(body.id, "DcReject");
        assert_eq!(body.path, PathBuf::from("a=b.bin"));
    }

    #[test]
    fn test_parse_body_arg_with_platform() {
        let body = parse_body_arg("DcReject@macos-arm64=dc.arm64.bin").unwrap();
        assert_eq!(body.id, "DcReject");
        assert_eq!(body.platform, Some(Platform::MacOsArm64));
        assert_eq!(body.path, PathBuf::from("dc.arm64.bin"));
    }

    #[test]
    fn test_parse_body_arg_rejects_malformed() {
        assert!(parse_body_arg("DcReject").is_err());
        assert!(parse_body_arg("=body.bin").is_err());
        assert!(parse_body_arg("DcReject=").is_err());
        assert!(parse_body_arg("DcReject@amiga=dc.bin").is_err());
        assert!(parse_body_arg("@macos=dc.bin").is_err());
    }
}
