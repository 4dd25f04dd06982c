use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectra", about = "Edit the short-time spectrum of an audio file and resynthesise it")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output audio file
    #[arg(short, long, default_value = "output.wav")]
    pub output: PathBuf,

    /// Config file (defaults to ./spectra.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fraction of each frame shared with the next one. Resynthesis needs 0.5.
    #[arg(long, default_value_t = 0.5)]
    pub overlap: f64,

    /// Stroke point in layout space as x,y,z. Repeat to draw a stroke.
    #[arg(short, long = "point", value_parser = parse_point, allow_hyphen_values = true)]
    pub points: Vec<[f64; 3]>,

    /// Cells closer than this to the stroke are edited
    #[arg(short, long, default_value_t = 0.01)]
    pub radius: f64,

    /// Push selected magnitudes up (positive) or down (negative), scaled by the deform factor
    #[arg(long, allow_hyphen_values = true, conflicts_with_all = ["set", "restore"])]
    pub offset: Option<f64>,

    /// Set selected magnitudes to this value
    #[arg(long, conflicts_with = "restore")]
    pub set: Option<f64>,

    /// Put selected magnitudes back to their analysed values
    #[arg(long)]
    pub restore: bool,

    /// Magnitude change per unit of --offset
    #[arg(long, default_value_t = 0.01)]
    pub deform_factor: f64,

    /// Distance used to select cells: euclidean or planar
    #[arg(long, default_value = "euclidean")]
    pub metric: String,

    /// Output sample format: int16, float32 or float64 (float64 needs --raw)
    #[arg(short, long, default_value = "float32")]
    pub format: String,

    /// Write headerless little-endian PCM instead of WAV
    #[arg(long)]
    pub raw: bool,

    /// Print the analysis summary and exit
    #[arg(long)]
    pub info: bool,
}

fn parse_point(s: &str) -> Result<[f64; 3], String> {
    let coords: Vec<f64> = s
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|e| format!("{}: {}", c.trim(), e)))
        .collect::<Result<_, _>>()?;
    match coords.as_slice() {
        &[x, y, z] => Ok([x, y, z]),
        _ => Err(format!("expected x,y,z but got {} values", coords.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points() {
        assert_eq!(parse_point("0.5, -1,2e-2"), Ok([0.5, -1.0, 0.02]));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,a,2").is_err());
    }

    #[test]
    fn collects_a_stroke() {
        let cli = Cli::parse_from([
            "spectra", "in.wav", "-p", "0,0,0", "-p", "1,0,1", "--set", "0.2", "--radius", "0.5",
        ]);
        assert_eq!(cli.points, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 1.0]]);
        assert_eq!(cli.set, Some(0.2));
        assert_eq!(cli.radius, 0.5);
        assert_eq!(cli.output, PathBuf::from("output.wav"));
    }

    #[test]
    fn tools_are_exclusive() {
        let result = Cli::try_parse_from(["spectra", "in.wav", "--set", "0.2", "--restore"]);
        assert!(result.is_err());
        let cli = Cli::parse_from(["spectra", "in.wav", "--offset", "-3"]);
        assert_eq!(cli.offset, Some(-3.0));
    }
}
