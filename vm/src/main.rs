use clap::Parser;
use norn_runtime::{ExecutionResult, VirtualMachine, VmConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_log::log::debug;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    #[arg(
        short = 'c',
        long = "classpath",
        visible_alias = "cp",
        visible_alias = "class-path",
        value_delimiter = ':',
        help = "Classpath entries (directories and .jar files); use ':' as separator"
    )]
    pub class_path: Vec<PathBuf>,
    #[arg(long = "jar", help = "Run the Main-Class of this jar")]
    pub jar: Option<PathBuf>,
    #[arg(
        short = 'D',
        value_name = "KEY=VALUE",
        help = "Set an initial system property"
    )]
    pub properties: Vec<String>,
    #[arg(help = "Main class to run (com.example.Main or com/example/Main); \
        optional with --jar")]
    pub main_class: Option<String>,
    #[arg(trailing_var_arg = true, help = "Arguments passed to main(String[])")]
    pub program_args: Vec<String>,
}

fn parse_properties(raw: &[String]) -> Result<HashMap<String, String>, String> {
    let mut properties = HashMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(format!("property {entry:?} is not KEY=VALUE"));
        };
        properties.insert(key.to_owned(), value.to_owned());
    }
    Ok(properties)
}

fn create_vm_configuration(args: &Args) -> Result<VmConfig, String> {
    let mut class_path = args.class_path.clone();
    if class_path.is_empty() && args.jar.is_none() {
        let current_dir =
            std::env::current_dir().map_err(|e| format!("cannot get current dir: {e}"))?;
        class_path.push(current_dir);
    }
    if let Some(jar) = &args.jar {
        class_path.push(jar.clone());
    }

    Ok(VmConfig {
        class_path,
        main_class: args.main_class.as_ref().map(|c| c.replace('.', "/")),
        properties: parse_properties(&args.properties)?,
        ..VmConfig::default()
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    debug!("Provided command line arguments: {:?}", args);

    let vm_config = match create_vm_configuration(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error creating VM configuration: {e}");
            std::process::exit(2);
        }
    };

    let vm = match VirtualMachine::new(vm_config) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let Some(main_class) = vm.config().main_class.clone() else {
        eprintln!("Error: no main class given and no Main-Class in manifest");
        std::process::exit(2);
    };

    if let Err(e) = vm.prepare_execution() {
        eprintln!("Error preparing execution: {e}");
        std::process::exit(1);
    }

    match vm.invoke_main(&main_class, &args.program_args) {
        ExecutionResult::Void | ExecutionResult::Return(_) => {}
        ExecutionResult::Thrown { value, .. } => {
            eprintln!(
                "Exception in thread \"main\" {}",
                vm.render_throwable(&value)
            );
            std::process::exit(1);
        }
        ExecutionResult::Invalid(message) => {
            eprintln!("Error: {message}");
            std::process::exit(1);
        }
    }
}
