//! Thin command-line driver over the espa-raster library.
//!
//! Reads an ESPA archive, prints a scene summary and optionally writes an
//! RGB composite as PNG.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use espa_raster::{ColorScheme, MaskPolicy, RasterSetReader, ReadOptions};
use log::info;

const USAGE: &str = "usage: espa-raster <scene.xml> [options]

options:
    --meta-only          decode metadata only, skip pixel data
    --cast               represent invalid pixels as NaN in f32 arrays
    --yflip              flip bands vertically on load
    --bands a,b,c        only load the named bands
    --scheme NAME        composite scheme: true, infrared, false_a, false_b, false_c
    --names r,g,b        explicit composite band names (overrides --scheme)
    --out FILE.png       write the RGB composite to FILE.png";

struct Args {
    xml: PathBuf,
    meta_only: bool,
    cast: bool,
    yflip: bool,
    bands: Option<Vec<String>>,
    scheme: ColorScheme,
    names: Option<[String; 3]>,
    out: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut xml = None;
    let mut meta_only = false;
    let mut cast = false;
    let mut yflip = false;
    let mut bands = None;
    let mut scheme = ColorScheme::TrueColor;
    let mut names = None;
    let mut out = None;

    let mut argv = env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--meta-only" => meta_only = true,
            "--cast" => cast = true,
            "--yflip" => yflip = true,
            "--bands" => {
                let value = argv.next().ok_or("--bands needs a value")?;
                bands = Some(value.split(',').map(str::to_string).collect());
            }
            "--scheme" => {
                let value = argv.next().ok_or("--scheme needs a value")?;
                scheme = ColorScheme::from_name(&value)
                    .ok_or_else(|| format!("unknown scheme `{value}`"))?;
            }
            "--names" => {
                let value = argv.next().ok_or("--names needs a value")?;
                let parts: Vec<String> = value.split(',').map(str::to_string).collect();
                let triple: [String; 3] = parts
                    .try_into()
                    .map_err(|_| "--names needs exactly three band names".to_string())?;
                names = Some(triple);
            }
            "--out" => out = Some(PathBuf::from(argv.next().ok_or("--out needs a value")?)),
            "--help" | "-h" => return Err(String::new()),
            other if other.starts_with('-') => return Err(format!("unknown option `{other}`")),
            other => {
                if xml.replace(PathBuf::from(other)).is_some() {
                    return Err("more than one metadata file given".into());
                }
            }
        }
    }

    Ok(Args {
        xml: xml.ok_or("no metadata file given")?,
        meta_only,
        cast,
        yflip,
        bands,
        scheme,
        names,
        out,
    })
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = RasterSetReader::new(&args.xml).with_yflip(args.yflip);

    let mut options = ReadOptions::new().metadata_only(args.meta_only);
    if args.cast {
        options = options.policy(MaskPolicy::Cast);
    }
    if let Some(bands) = &args.bands {
        options = options.allow(bands.iter().cloned());
    }

    let set = reader.read(&options)?;

    if let Some(meta) = &set.global_metadata {
        println!(
            "satellite: {}  instrument: {}  acquired: {}",
            meta.satellite.as_deref().unwrap_or("?"),
            meta.instrument.as_deref().unwrap_or("?"),
            meta.acquisition_date.as_deref().unwrap_or("?"),
        );
    }
    if let (Some(nlines), Some(nsamps)) = (set.nlines, set.nsamps) {
        println!("dimensions: {nlines} lines x {nsamps} samples");
    }

    let mut band_names: Vec<&String> = set.bands.keys().collect();
    band_names.sort();
    for name in band_names {
        let band = &set.bands[name];
        match band.dims() {
            Some((nlines, nsamps)) => println!(
                "  {name}: {nlines}x{nsamps} {}",
                band.data_type.as_deref().unwrap_or("")
            ),
            None => println!("  {name}"),
        }
    }

    if let Some(out) = &args.out {
        let rgb = match &args.names {
            Some([r, g, b]) => set.rgb_from_names([r.as_str(), g.as_str(), b.as_str()])?,
            None => set.rgb(args.scheme)?,
        };
        let (rows, cols, _) = rgb.dim();
        let flat: Vec<u8> = rgb.iter().copied().collect();
        let image = image::RgbImage::from_raw(cols as u32, rows as u32, flat)
            .ok_or("composite buffer does not match its dimensions")?;
        image.save(out)?;
        info!("wrote composite to {}", out.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {message}");
            }
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
