use std::fs;
use std::rc::Rc;

use clap::Parser;
use filter_host::{
    FilterHost, FilterInput, FilterOutcome, HostCallbacks, HostConfig, MemorySuites, ParameterSet, RunOptions,
    SelectionMask, Surface, args::Args, error::HostError, plugin::Plugin,
};
use image::GenericImageView;
use log::info;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("filter_host=debug,info")
        } else {
            EnvFilter::new("filter_host=info,warn")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_logging(args.verbose);

    args.check_basic_paths_exists()?;

    let config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    let memory = Rc::new(MemorySuites::new(config.buffer_space_ceiling));

    let plugin_lib = Plugin::new(args.plugin_file()?)?;

    if args.about {
        for name in &args.entry_points {
            let interface = plugin_lib.interface(name)?;
            let mut host = FilterHost::new(interface.entry(), Rc::clone(&memory), config.clone());
            host.about()?;
        }
        return Ok(());
    }

    let (Some(input), Some(output)) = (&args.input, &args.output) else {
        anyhow::bail!("--input and --output are required");
    };
    let interface = plugin_lib.interface(&args.entry_points[0])?;

    let img = image::open(input)?;
    let (width, height) = img.dimensions();
    let source = Surface::from_rgba(width, height, img.to_rgba8().into_raw())
        .ok_or(HostError::ImageTooLarge(width, height))?;

    let mut filter_input = FilterInput::new(source);
    if let Some(mask) = &args.mask {
        let mask = image::open(mask)?.to_luma8();
        let (mask_width, mask_height) = mask.dimensions();
        filter_input.mask = Some(
            SelectionMask::new(mask_width, mask_height, mask.into_raw())
                .ok_or(HostError::MaskSizeMismatch(mask_width, mask_height, width, height))?,
        );
    }
    if let Some(params) = args.params.as_ref().filter(|p| p.exists()) {
        filter_input.parameters = ParameterSet::from_json(&fs::read_to_string(params)?)?;
    }

    let callbacks = HostCallbacks {
        progress: Box::new(|done, total| info!("progress {done}/{total}")),
        abort: Box::new(|| false),
    };
    let options = RunOptions {
        repeat: args.repeat,
        ..RunOptions::default()
    };

    let mut host = FilterHost::new(interface.entry(), Rc::clone(&memory), config);
    let outcome = host.run(filter_input, callbacks, options)?;
    let stats = host.pump_stats();
    drop(host);

    let result = match outcome {
        FilterOutcome::Canceled => {
            println!("Filter canceled");
            return Ok(());
        }
        FilterOutcome::Completed(result) => result,
    };
    info!("pump: {stats:?}");

    let image = image::RgbaImage::from_raw(result.image.width(), result.image.height(), result.image.to_rgba())
        .ok_or_else(|| anyhow::anyhow!("filter produced a malformed image"))?;
    image.save(output)?;

    if let Some(params) = &args.params {
        if !args.repeat {
            fs::write(params, result.parameters.to_json()?)?;
        }
    }

    println!("Image saved successfully");

    Ok(())
}
