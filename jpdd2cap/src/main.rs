use clap::Parser;
use log::info;
use std::error;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process;

use jp2::resolution::{convert_display_to_capture, ConversionOutcome};

#[derive(Debug)]
enum JPDD2CapError {
    InputMissing { path: String },
    Reading { path: String, error: String },
    Writing { path: String, error: String },
}

impl error::Error for JPDD2CapError {}
impl fmt::Display for JPDD2CapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InputMissing { path } => {
                write!(f, "{} does not exist", path)
            }
            Self::Reading { path, error } => {
                write!(f, "error reading input image {}: {}", path, error)
            }
            Self::Writing { path, error } => {
                write!(f, "error writing output image {}: {}", path, error)
            }
        }
    }
}

/// Converts Default Display Resolution box in JP2 image to Capture
/// Resolution box.
///
/// Also works for JPX and JPM images. No output image is created when the
/// input has no resolution box, no display resolution box, or already has a
/// capture resolution box.
#[derive(Parser)]
#[clap(version)]
struct Opts {
    /// Input JP2 image
    jp2_in: PathBuf,

    /// Output JP2 image
    jp2_out: PathBuf,
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts: Opts = Opts::parse();

    if !opts.jp2_in.is_file() {
        return Err(JPDD2CapError::InputMissing {
            path: opts.jp2_in.display().to_string(),
        }
        .into());
    }

    let data = fs::read(&opts.jp2_in).map_err(|error| JPDD2CapError::Reading {
        path: opts.jp2_in.display().to_string(),
        error: error.to_string(),
    })?;
    info!("Read {} bytes from {:?}", data.len(), opts.jp2_in);

    match convert_display_to_capture(data) {
        ConversionOutcome::Converted(data) => {
            fs::write(&opts.jp2_out, &data).map_err(|error| JPDD2CapError::Writing {
                path: opts.jp2_out.display().to_string(),
                error: error.to_string(),
            })?;
            info!("Wrote {} bytes to {:?}", data.len(), opts.jp2_out);
        }
        ConversionOutcome::Skipped(reason) => {
            eprintln!("User warning: {}", reason);
            eprintln!("No output image created");
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_opts() {
        Opts::command().debug_assert();

        let opts = Opts::try_parse_from(["jpdd2cap", "in.jp2", "out.jp2"]).unwrap();
        assert_eq!(opts.jp2_in, PathBuf::from("in.jp2"));
        assert_eq!(opts.jp2_out, PathBuf::from("out.jp2"));

        assert!(Opts::try_parse_from(["jpdd2cap", "in.jp2"]).is_err());
    }

    #[test]
    fn test_error_messages() {
        let error = JPDD2CapError::InputMissing {
            path: "missing.jp2".to_string(),
        };
        assert_eq!(error.to_string(), "missing.jp2 does not exist");

        let error = JPDD2CapError::Writing {
            path: "out.jp2".to_string(),
            error: "permission denied".to_string(),
        };
        assert!(error.to_string().starts_with("error writing output image"));
    }
}
