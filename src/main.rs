use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};

use langmap_translator::pack::archive::decode_text;
use langmap_translator::pack::locate::load_batch;
use langmap_translator::pack::writer::write_resource_pack_file;
use langmap_translator::pipeline::export::RequestWriter;
use langmap_translator::pipeline::{
    init_default_config, Batch, BatchOutcome, ChunkLimit, ConfigOverrides, PipelineConfig,
};
use langmap_translator::progress::ConsoleProgress;
use langmap_translator::PipelineError;

#[derive(Parser, Debug)]
#[command(name = "langmap-translator")]
#[command(
    about = "Prepare missing language-file keys for translation and fold the answers back into a resource pack",
    long_about = None
)]
struct Args {
    /// Generate default config + request template, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/template files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/template files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .jar/.zip archives or flat source .json files; all go into one pack
    #[arg(value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Existing partial translation (.json) to complete instead of the one found in the archive (single input only)
    #[arg(long, value_name = "JSON")]
    existing: Option<PathBuf>,

    /// Config file path (default: search for langmap-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write request files (default: <input_stem>_requests next to the first input)
    #[arg(long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Also print request N (1-based, counted across all inputs) to stdout
    #[arg(long, value_name = "N")]
    part: Option<usize>,

    /// Pasted translator answer; repeat for several files (read in the given order)
    #[arg(long, value_name = "FILE")]
    response: Vec<PathBuf>,

    /// Output resource pack (default: pack file name from config, next to the first input)
    #[arg(short, long, value_name = "ZIP")]
    output: Option<PathBuf>,

    /// Bound requests by key count
    #[arg(long)]
    max_keys: Option<usize>,

    /// Bound requests by rendered JSON size in characters
    #[arg(long)]
    max_chars: Option<usize>,

    /// Source language file stem (e.g. en_us)
    #[arg(long)]
    source_lang: Option<String>,

    /// Target language file stem (e.g. ru_ru)
    #[arg(long)]
    target_lang: Option<String>,

    /// Discard answered keys that were never requested
    #[arg(long)]
    drop_stray_keys: bool,

    /// No status output on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        progress.info(format!("Wrote config: {}", cfg_path.display()));
        return Ok(());
    }

    let Some(first_input) = args.inputs.first().cloned() else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  langmap-translator <mod.jar>...                       write translation requests\n  langmap-translator <mod.jar>... --response answer.txt   build the resource pack\n"
        );
        return Ok(());
    };

    let cfg = PipelineConfig::resolve(
        &first_input,
        ConfigOverrides {
            config_path: args.config.clone(),
            max_keys: args.max_keys,
            max_chars: args.max_chars,
            source_lang: args.source_lang.clone(),
            target_lang: args.target_lang.clone(),
            drop_stray_keys: args.drop_stray_keys,
        },
    )
    .context("build config")?;
    if let Some(p) = cfg.config_path.as_ref() {
        progress.info(format!("Config: {}", p.display()));
    }

    let loaded = load_batch(
        &args.inputs,
        args.existing.as_deref(),
        &cfg.source_lang,
        &cfg.target_lang,
        cfg.limit,
    )?;
    for failure in &loaded.failures {
        progress.warn(format!("{}: {:#}", failure.input.display(), failure.error));
    }
    let batch = loaded.batch;
    if batch.is_empty() {
        return Err(anyhow!("none of the {} input(s) could be loaded", args.inputs.len()));
    }
    for session in batch.sessions() {
        let status = if session.is_complete() {
            "complete".to_string()
        } else {
            format!(
                "{} missing ({} part(s), {})",
                session.delta().len(),
                session.chunks().len(),
                describe_limit(session.limit())
            )
        };
        progress.info(format!(
            "[{}] {} source keys, {} already translated, {status}",
            session.unit().identifier(),
            session.unit().source().len(),
            session.unit().original().map_or(0, |m| m.len()),
        ));
    }

    if !args.response.is_empty() {
        return import(&args, &first_input, &cfg, &batch, &progress);
    }

    if batch.is_complete() {
        progress.info("Every input is already translated; nothing to request.");
        if let Some(output) = args.output.as_ref() {
            let written = write_resource_pack_file(output, &cfg.pack, &batch.finalize_complete())?;
            progress.info(format!(
                "Packed existing translations ({written} file(s)): {}",
                output.display()
            ));
        }
        return Ok(());
    }

    export(&args, &first_input, &cfg, &batch, &progress)
}

fn export(
    args: &Args,
    first_input: &Path,
    cfg: &PipelineConfig,
    batch: &Batch,
    progress: &ConsoleProgress,
) -> anyhow::Result<()> {
    let requests = batch.requests(&cfg.formatter)?;
    let dir = match args.export_dir.clone() {
        Some(d) => d,
        None => {
            let stem = first_input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("input")
                .to_string();
            first_input.with_file_name(format!("{stem}_requests"))
        }
    };
    let writer = RequestWriter::new(dir)?;
    for (i, request) in requests.iter().enumerate() {
        let path = writer.write_part(&request.identifier, &request.payload)?;
        progress.progress(&format!("wrote {}", path.display()), i + 1, requests.len());
    }
    progress.info(format!(
        "Send each request to the translator, save the answers, then run again with the same inputs and --response <file> (repeatable). Requests: {}",
        writer.dir().display()
    ));

    if let Some(n) = args.part {
        let request = n
            .checked_sub(1)
            .and_then(|i| requests.get(i))
            .ok_or_else(|| anyhow!("request {n} does not exist (1..={})", requests.len()))?;
        println!("{}", request.payload.text);
    }
    Ok(())
}

fn import(
    args: &Args,
    first_input: &Path,
    cfg: &PipelineConfig,
    batch: &Batch,
    progress: &ConsoleProgress,
) -> anyhow::Result<()> {
    let mut pasted = Vec::with_capacity(args.response.len());
    for path in &args.response {
        let data =
            std::fs::read(path).with_context(|| format!("read response: {}", path.display()))?;
        pasted.push(decode_text(&data));
    }
    let raw = pasted.join("\n");

    let outcome = batch.import_responses(&raw, cfg.stray_keys)?;
    log_outcome(&outcome, progress);

    let output = args.output.clone().unwrap_or_else(|| {
        first_input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&cfg.pack.file_name)
    });
    let written = write_resource_pack_file(&output, &cfg.pack, &outcome.pack_entries())?;
    progress.info(format!(
        "Wrote {} ({written} {}.json file(s))",
        output.display(),
        cfg.pack.target_lang
    ));
    Ok(())
}

fn log_outcome(outcome: &BatchOutcome, progress: &ConsoleProgress) {
    let report = &outcome.report;
    progress.info(format!(
        "Recovered {} block(s) of {} expected",
        report.blocks_parsed, report.expected_blocks
    ));
    for fragment in &report.skipped {
        progress.warn(PipelineError::MalformedFragment(fragment.clone()).to_string());
    }
    if report.missing_blocks() > 0 {
        progress.warn(format!(
            "expected {} block(s) but found {}; some parts may not have been pasted",
            report.expected_blocks, report.blocks_parsed
        ));
    }
    if !report.stray_keys.is_empty() {
        let action = if report.stray_keys_dropped { "dropped" } else { "kept" };
        progress.warn(format!(
            "{} key(s) were never requested and were {action}: {}",
            report.stray_keys.len(),
            preview(&report.stray_keys)
        ));
    }
    if !outcome.unrouted.is_empty() {
        progress.warn(format!(
            "{} key(s) belong to no loaded input and were left out: {}",
            outcome.unrouted.len(),
            preview(&outcome.unrouted)
        ));
    }
    for unit in &outcome.units {
        progress.info(format!(
            "[{}] {} translated key(s) received, {} key(s) in the final map",
            unit.identifier,
            unit.received,
            unit.final_map.len()
        ));
        if !unit.still_missing.is_empty() {
            progress.warn(format!(
                "[{}] {} requested key(s) are still untranslated: {}",
                unit.identifier,
                unit.still_missing.len(),
                preview(&unit.still_missing)
            ));
        }
    }
}

fn preview(keys: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut out = keys.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if keys.len() > SHOWN {
        out.push_str(&format!(", ... (+{})", keys.len() - SHOWN));
    }
    out
}

fn describe_limit(limit: ChunkLimit) -> String {
    match limit {
        ChunkLimit::Keys(n) => format!("max {n} keys per part"),
        ChunkLimit::Chars(n) => format!("max {n} chars per part"),
    }
}
