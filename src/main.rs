use std::path::PathBuf;
use std::process;

use clap::Parser;

use voico::audio_io::audio_info;
use voico::config::ConversionQuality;
use voico::converter::{auto_output_path, ConversionRequest, VoiceConverter};
use voico::error::VoicoError;

/// Modular voice converter: pitch/formant analysis, matching and resynthesis.
#[derive(Parser)]
#[command(name = "voico", version)]
struct Cli {
    /// Input audio file (source voice).
    input_file: PathBuf,

    /// Target audio file to mimic; overrides manual shift values.
    #[arg(short, long)]
    target: Option<PathBuf>,

    /// Output file path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Manual pitch shift in semitones.
    #[arg(short, long, default_value_t = 0.0)]
    pitch: f32,

    /// Manual formant shift factor.
    #[arg(short, long, default_value_t = 1.0)]
    formant: f32,

    /// Processing quality preset: turbo, fast, balanced, high, ultra, master.
    #[arg(short, long, default_value = "balanced")]
    quality: String,

    /// Output bit depth (16-bit PCM or 32-bit float).
    #[arg(long, default_value_t = 16)]
    bit_depth: u16,

    /// Print file metadata and exit.
    #[arg(long)]
    info: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Err(err) = run(&cli) {
        match err.downcast_ref::<VoicoError>() {
            Some(voico_err) => {
                eprintln!("Error: {voico_err}");
                for suggestion in voico_err.suggestions() {
                    eprintln!("  {suggestion}");
                }
            }
            None => eprintln!("Error: {err:#}"),
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.info {
        let info = audio_info(&cli.input_file)?;
        println!("File:        {}", info.path);
        println!("Format:      {}", info.format);
        println!("Sample rate: {} Hz", info.sample_rate);
        println!("Channels:    {}", info.channels);
        println!("Frames:      {}", info.frames);
        println!("Duration:    {:.3} s", info.duration_seconds);
        println!("Bit depth:   {}", info.bits_per_sample);
        println!("Size:        {} bytes", info.file_size_bytes);
        return Ok(());
    }

    let quality: ConversionQuality = cli.quality.parse()?;

    let output_path = cli.output.clone().unwrap_or_else(|| {
        auto_output_path(
            &cli.input_file,
            cli.target.as_deref(),
            cli.pitch,
            cli.formant,
        )
    });

    let request = ConversionRequest {
        input_path: cli.input_file.clone(),
        output_path,
        pitch_shift: cli.pitch,
        formant_shift: cli.formant,
        target_path: cli.target.clone(),
        bit_depth: cli.bit_depth,
    };

    let mut converter = VoiceConverter::new(quality);
    let report = converter.process(&request)?;

    println!("Wrote {}", report.output_path);
    println!(
        "Applied: {:+.2} st pitch, {:.2}x formant",
        report.pitch_shift_applied, report.formant_shift_applied
    );
    println!(
        "Duration: {:.2} s -> {:.2} s @ {} Hz",
        report.input_duration_seconds, report.output_duration_seconds, report.sample_rate
    );
    println!(
        "SNR: {:.1} dB, centroid deviation: {:.3}",
        report.snr_db, report.spectral_centroid_deviation
    );
    if cli.verbose {
        for (stage, seconds) in &report.stage_timings {
            println!("  {stage}: {seconds:.3} s");
        }
    }
    Ok(())
}
