use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use mp4salvage::{
    extract_audio, inspect_file, recover, DeviceProfile, RecoverOptions, ScanProfile,
};

#[derive(Debug)]
struct Args {
    source: Option<PathBuf>,
    reference: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    audio: Option<PathBuf>,
    verbose: bool,
}

fn print_usage() {
    println!("Usage: mp4salvage -s <corrupted.mp4> [options]");
    println!();
    println!("Options:");
    println!("  -s <file>   capture to inspect or recover");
    println!("  -r <file>   finalized reference capture from the same camera");
    println!("  -o <file>   write the recovered file here (needs -r)");
    println!("  -a <file>   extract the raw AAC stream to this file (instead of -r/-o)");
    println!("  -c <file>   JSON device profile overriding the ONE X constants");
    println!("  -v          debug logging");
    println!();
    println!("With -s alone the box structure is dumped. With -r but no -o the");
    println!("recovery runs in test mode and only reports what it would write.");
}

fn next_value(argv: &mut impl Iterator<Item = String>, flag: &str) -> Result<PathBuf, String> {
    argv.next()
        .map(PathBuf::from)
        .ok_or_else(|| format!("{} needs a value", flag))
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args {
        source: None,
        reference: None,
        output: None,
        config: None,
        audio: None,
        verbose: false,
    };
    while let Some(flag) = argv.next() {
        match flag.as_str() {
            "-s" => args.source = Some(next_value(&mut argv, "-s")?),
            "-r" => args.reference = Some(next_value(&mut argv, "-r")?),
            "-o" => args.output = Some(next_value(&mut argv, "-o")?),
            "-c" => args.config = Some(next_value(&mut argv, "-c")?),
            "-a" => args.audio = Some(next_value(&mut argv, "-a")?),
            "-v" => args.verbose = true,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    if args.output.is_some() && args.reference.is_none() {
        return Err("-o needs a reference capture (-r) to recover against".to_string());
    }
    if args.audio.is_some() && (args.reference.is_some() || args.output.is_some()) {
        return Err("-a extracts the audio stream only and cannot be combined with -r or -o".to_string());
    }
    Ok(args)
}

fn run(args: &Args, source: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let profile = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            serde_json::from_str::<DeviceProfile>(&text)?
        }
        None => DeviceProfile::default(),
    };

    if let Some(audio_out) = &args.audio {
        let report = extract_audio(source, audio_out, &ScanProfile::default())?;
        println!(
            "✅ Extracted {} audio frames ({} bytes) to {}",
            report.frames,
            report.bytes,
            audio_out.display()
        );
        return Ok(());
    }

    match &args.reference {
        Some(reference) => {
            let options = RecoverOptions {
                source: source.to_path_buf(),
                reference: reference.clone(),
                output: args.output.clone(),
                durations: profile.durations,
                layout: profile.layout,
                profile: ScanProfile::default(),
            };
            let report = recover(&options)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            match &args.output {
                Some(output) => println!("✅ Recovered file written to {}", output.display()),
                None => println!("✅ Test mode passed; rerun with -o to write the recovered file"),
            }
        }
        None => {
            let records = inspect_file(source)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}


fn main() {
    println!("🎥 mp4salvage - unfinalized capture recovery");
    println!("============================================");

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            println!("❌ {}", message);
            println!();
            print_usage();
            process::exit(1);
        }
    };

    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let source = match args.source.clone() {
        Some(source) => source,
        None => {
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(&args, &source) {
        println!("❌ Recovery failed: {}", e);
        process::exit(1);
    }
}
