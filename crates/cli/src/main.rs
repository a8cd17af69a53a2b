mod store;

use anyhow::Context;
use config::{Config, File};
use continent::{
    rng::derive_continent_seed, save_continent, validator::ValidationErrors, Continent,
    ContinentTemplate, GenerateError, NoopHost, Progress, StorageError, Template,
};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{path::PathBuf, process};
use structopt::StructOpt;

/// CLI for generating continents via the Continent generation kit.
#[derive(Debug, StructOpt)]
#[structopt(name = "continent")]
struct Opt {
    /// The logging level to use during generation. See
    /// https://docs.rs/log/0.4.11/log/enum.LevelFilter.html for options
    #[structopt(short, long, default_value = "info", global = true)]
    log_level: LevelFilter,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Generate a continent and save it to an output directory
    Generate {
        /// World seed (32-bit unsigned integer)
        #[structopt(short, long)]
        seed: String,

        /// Path to a continent template file. Supported formats: JSON, TOML
        #[structopt(short, long)]
        template: PathBuf,

        /// Directory to write the continent metadata and texture blobs into
        #[structopt(short, long)]
        out: PathBuf,

        /// Identifier of the world this continent belongs to
        #[structopt(long, default_value = "world")]
        world_id: String,

        /// Index of this continent within the world. When given, the
        /// effective seed is derived from the world seed and this index,
        /// so one world seed yields distinct continents
        #[structopt(long)]
        continent_index: Option<u32>,
    },
}

fn parse_seed(seed: &str) -> anyhow::Result<u32> {
    seed.trim()
        .parse::<u32>()
        .map_err(|_| GenerateError::InvalidSeed(seed.to_string()).into())
}

fn load_template(path: &PathBuf) -> anyhow::Result<Template> {
    let path_str = path
        .to_str()
        .with_context(|| format!("invalid character in path {:?}", path))?;
    let mut settings = Config::new();
    settings
        .merge(File::with_name(path_str))
        .context("error reading template file")?;
    settings.try_into().context("error reading template")
}

fn run(opt: Opt) -> anyhow::Result<()> {
    SimpleLogger::new().with_level(opt.log_level).init()?;

    match opt.command {
        Command::Generate {
            seed,
            template,
            out,
            world_id,
            continent_index,
        } => {
            let world_seed = parse_seed(&seed)?;
            let seed = match continent_index {
                Some(index) => derive_continent_seed(world_seed, index),
                None => world_seed,
            };
            let template = load_template(&template)?;
            let template = ContinentTemplate::resolve(template)?;
            let continent_id = match continent_index {
                Some(index) => format!("{}-{}-{}", template.name(), world_seed, index),
                None => format!("{}-{}", template.name(), world_seed),
            };

            let mut progress = |p: &Progress| {
                info!(
                    "[{}/{}] {} ({:.0}%)",
                    p.stage_index + 1,
                    p.stage_count,
                    p.message,
                    p.progress * 100.0
                );
            };
            let continent = Continent::generate(seed, template, &NoopHost, &mut progress)?;

            let mut store = store::DirStore::new(&out)?;
            save_continent(&mut store, &continent, &world_id, &continent_id)?;
            info!(
                "Saved continent {} ({} spines, {} rivers, {} zones) to {:?}",
                continent_id,
                continent.data().spines.len(),
                continent.data().rivers.len(),
                continent.data().zones.len(),
                out
            );
            Ok(())
        }
    }
}

/// Map a failure to the documented exit codes: 1 invalid input, 2 I/O
/// error, 3 cancelled.
fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(gen) = err.downcast_ref::<GenerateError>() {
        return match gen {
            GenerateError::Cancelled => 3,
            GenerateError::InvalidSeed(_) | GenerateError::TemplateMismatch { .. } => 1,
        };
    }
    if err.downcast_ref::<StorageError>().is_some() || err.downcast_ref::<std::io::Error>().is_some()
    {
        return 2;
    }
    // Validation failures and unreadable templates are input errors
    if err.downcast_ref::<ValidationErrors>().is_some()
        || err.downcast_ref::<config::ConfigError>().is_some()
    {
        return 1;
    }
    1
}

fn main() {
    let code = match run(Opt::from_args()) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code(&err)
        }
    };
    process::exit(code);
}
