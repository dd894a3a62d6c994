//! dmp CLI - convert XML and CSV sources to GDM records
//!
//! # Main Commands
//!
//! ```bash
//! dmp records input.xml --record-tag rec   # XML/CSV to record graphs as JSON
//! dmp schema input.xml --record-tag rec    # Infer the schema of all records
//! dmp transform --task task.json           # Run a mapping task over its input
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! dmp csv-json input.csv --schema          # Rows as JSON objects
//! dmp csv-preview input.csv --rows 5       # Rows re-serialized as text
//! dmp functions                            # Show transformation functions
//! dmp example-script                       # Show an example matrix script
//! ```

use clap::{Args, Parser, Subcommand};
use dmp_converter::logs::LOG_BROADCASTER;
use dmp_converter::{
    encode_rows, example_script, execute_task, functions_description, generate_schema,
    infer_attribute_paths_concurrently, keys, record_source, Configuration, ConverterSettings, CsvJsonEncoder,
    CsvRowReader, CsvSettings, CsvTextEncoder, DataModel, DataResource, FileOpener, Parameters, Task,
    TransformationFlow,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dmp")]
#[command(about = "Convert XML and CSV sources to Graph Data Model records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Only print results, no progress
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also print debug messages
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Where the input comes from and how it is read.
#[derive(Args)]
struct InputArgs {
    /// Input XML or CSV file
    input: PathBuf,

    /// JSON object of configuration parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage type (xml, csv, ...); default: from the file extension
    #[arg(long)]
    storage_type: Option<String>,

    /// XML element that delimits records
    #[arg(long)]
    record_tag: Option<String>,

    /// Data model id used in minted URIs
    #[arg(long)]
    data_model_id: Option<String>,

    /// Read at most this many records
    #[arg(long)]
    at_most: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode records as GDM and print them as JSON
    Records {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print CSV rows as JSON objects
    CsvJson {
        #[command(flatten)]
        input: InputArgs,

        /// Attach the header names to the first record
        #[arg(long)]
        schema: bool,
    },

    /// Print CSV rows re-serialized with the configured dialect
    CsvPreview {
        #[command(flatten)]
        input: InputArgs,

        /// Number of rows to show
        #[arg(long, default_value = "10")]
        rows: usize,

        /// Print the header line first
        #[arg(long)]
        header: bool,
    },

    /// Infer the schema (or the attribute paths) of all records
    Schema {
        #[command(flatten)]
        input: InputArgs,

        /// Print attribute paths instead of the schema tree
        #[arg(long)]
        paths: bool,
    },

    /// Run a transformation task or script
    Transform {
        /// Task JSON (job, mappings and input data model)
        #[arg(short, long, required_unless_present = "script")]
        task: Option<PathBuf>,

        /// Matrix script JSON, run over --input
        #[arg(short, long, requires = "input")]
        script: Option<PathBuf>,

        /// Input file; overrides the task's data resource
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON object of configuration parameters for --input
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Transform at most this many records
        #[arg(long)]
        at_most: Option<usize>,
    },

    /// Show an example matrix script
    ExampleScript,

    /// Show available transformation functions
    Functions,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOG_BROADCASTER.set_echo(!cli.quiet);
    LOG_BROADCASTER.set_verbose(cli.verbose);

    let settings = ConverterSettings::from_env();
    let output = cli.output.as_deref();

    let result = match cli.command {
        Commands::Records { input } => cmd_records(&input, &settings, output),
        Commands::CsvJson { input, schema } => cmd_csv_json(&input, schema, output),
        Commands::CsvPreview { input, rows, header } => cmd_csv_preview(&input, rows, header, output),
        Commands::Schema { input, paths } => cmd_schema(&input, paths, &settings, output).await,
        Commands::Transform {
            task,
            script,
            input,
            config,
            at_most,
        } => cmd_transform(
            task.as_deref(),
            script.as_deref(),
            input.as_deref(),
            config.as_deref(),
            at_most,
            &settings,
            output,
        ),
        Commands::ExampleScript => cmd_example_script(),
        Commands::Functions => cmd_functions(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn load_parameters(path: Option<&Path>) -> Result<Parameters, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(serde_json::from_str(&fs::read_to_string(p)?)?),
        None => Ok(Parameters::new()),
    }
}

fn data_model(input: &InputArgs) -> Result<DataModel, Box<dyn std::error::Error>> {
    let mut parameters = load_parameters(input.config.as_deref())?;
    if let Some(storage_type) = &input.storage_type {
        parameters.set(keys::STORAGE_TYPE, storage_type.as_str());
    }
    if let Some(tag) = &input.record_tag {
        parameters.set(keys::RECORD_TAG, tag.as_str());
    }

    Ok(DataModel {
        id: input.data_model_id.clone(),
        name: input.input.file_name().map(|n| n.to_string_lossy().to_string()),
        configuration: Some(Configuration::with_parameters(parameters)),
        data_resource: Some(DataResource::from_path(input.input.to_string_lossy())),
        schema: None,
    })
}

fn csv_reader(input: &InputArgs) -> Result<CsvRowReader, Box<dyn std::error::Error>> {
    let parameters = load_parameters(input.config.as_deref())?;
    let mut settings = CsvSettings::from_parameters(&parameters)?;
    if input.at_most.is_some() {
        settings.at_most_rows = input.at_most;
    }
    let file = fs::File::open(&input.input)?;
    Ok(CsvRowReader::from_reader(file, &settings)?)
}

fn cmd_records(input: &InputArgs, settings: &ConverterSettings, output: Option<&Path>) -> CmdResult {
    eprintln!("📄 Reading records: {}", input.input.display());

    let model = data_model(input)?;
    let mut records = Vec::new();
    for item in record_source(&model, &FileOpener, &settings.base_uri, input.at_most)? {
        let (_, graph) = item?;
        records.push(graph.to_json());
    }
    eprintln!("✅ Encoded {} records", records.len());

    write_output(&serde_json::to_string_pretty(&records)?, output)
}

fn cmd_csv_json(input: &InputArgs, schema: bool, output: Option<&Path>) -> CmdResult {
    eprintln!("📄 Parsing CSV: {}", input.input.display());

    let reader = csv_reader(input)?;
    eprintln!("   Columns: {}", reader.header().join(", "));

    let mut encoder = CsvJsonEncoder::new().with_schema(schema);
    let rows: Vec<Value> = encode_rows(reader, &mut encoder)?;
    eprintln!("✅ Parsed {} rows", rows.len());

    write_output(&serde_json::to_string_pretty(&rows)?, output)
}

fn cmd_csv_preview(input: &InputArgs, rows: usize, header: bool, output: Option<&Path>) -> CmdResult {
    let parameters = load_parameters(input.config.as_deref())?;
    let settings = CsvSettings::from_parameters(&parameters)?;

    let mut reader_settings = settings.clone();
    reader_settings.at_most_rows = Some(input.at_most.map_or(rows, |cap| cap.min(rows)));
    let reader = CsvRowReader::from_reader(fs::File::open(&input.input)?, &reader_settings)?;

    let mut encoder = CsvTextEncoder::new(&settings).with_header(header);
    let lines = encode_rows(reader, &mut encoder)?;
    write_output(&lines.join("\n"), output)
}

async fn cmd_schema(input: &InputArgs, paths_only: bool, settings: &ConverterSettings, output: Option<&Path>) -> CmdResult {
    eprintln!("🔎 Inferring schema: {}", input.input.display());

    let model = data_model(input)?;
    let graphs = record_source(&model, &FileOpener, &settings.base_uri, input.at_most)?
        .map(|item| item.map(|(_, graph)| graph))
        .collect::<Result<Vec<_>, _>>()?;
    eprintln!("   Records: {}", graphs.len());

    let paths = infer_attribute_paths_concurrently(graphs).await?;
    eprintln!("✅ {} attribute paths", paths.len());

    let json = if paths_only {
        let listed: Vec<&[String]> = paths.iter().map(|p| p.segments()).collect();
        serde_json::to_string_pretty(&listed)?
    } else {
        serde_json::to_string_pretty(&generate_schema(&paths))?
    };
    write_output(&json, output)
}

fn cmd_transform(
    task_path: Option<&Path>,
    script_path: Option<&Path>,
    input: Option<&Path>,
    config: Option<&Path>,
    at_most: Option<usize>,
    settings: &ConverterSettings,
    output: Option<&Path>,
) -> CmdResult {
    let result = match (task_path, script_path) {
        (_, Some(script_path)) => {
            eprintln!("⚙️  Script: {}", script_path.display());
            let flow = TransformationFlow::from_script_file(script_path)?;
            let input = input.ok_or("--script needs --input")?;
            let args = InputArgs {
                input: input.to_path_buf(),
                config: config.map(Path::to_path_buf),
                storage_type: None,
                record_tag: None,
                data_model_id: None,
                at_most,
            };
            let model = data_model(&args)?;
            flow.apply_graphs(record_source(&model, &FileOpener, &settings.base_uri, at_most)?)?
        }
        (Some(task_path), None) => {
            eprintln!("⚙️  Task: {}", task_path.display());
            let mut task = Task::from_json(&fs::read_to_string(task_path)?)?;
            if let Some(model) = task.input_data_model.as_mut() {
                if let Some(input) = input {
                    model.data_resource = Some(DataResource::from_path(input.to_string_lossy()));
                }
                if config.is_some() {
                    let parameters = load_parameters(config)?;
                    model.configuration = Some(Configuration::with_parameters(parameters));
                }
            }
            execute_task(&task, &FileOpener, &settings.base_uri, at_most)?
        }
        (None, None) => return Err("either --task or --script is required".into()),
    };

    write_output(&result, output)?;
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_example_script() -> CmdResult {
    println!("{}", example_script().to_json()?);
    Ok(())
}

fn cmd_functions() -> CmdResult {
    println!("{}", functions_description());
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> CmdResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
