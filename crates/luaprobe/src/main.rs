use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use luaprobe_core::decode::{DecodeOptions, LuaDecoder, DEFAULT_MAX_STRING_LENGTH};
use luaprobe_core::function::{FunctionMetadata, LuaFunctionData};
use luaprobe_core::lua::LuaVersion;
use luaprobe_core::memory::{MemoryAccessor, PointerWidth, SnapshotMemory};
use luaprobe_core::platform::attach_process;
use luaprobe_core::symbols::SymbolStore;
use luaprobe_core::types::Address;
use luaprobe_core::value::LuaValue;
use luaprobe_core::{ProbeError, ProbeResult};
use luaprobe_utils::{debug, error, info, LogFormat, LogLevel, LoggingConfig, LoggingError, LoggingGuard};

/// Inspect Lua values and functions in a live process or a memory dump.
#[derive(Parser, Debug)]
#[command(name = "luaprobe")]
#[command(version)]
#[command(about = "Inspect Lua values and functions in a live process or a memory dump", long_about = None)]
struct Cli
{
    #[command(flatten)]
    target: TargetArgs,

    /// Lua version of the target runtime (5.1, 5.2, 5.3, 5.4)
    #[arg(long, default_value_t = LuaVersion::Lua53)]
    lua_version: LuaVersion,

    /// Truncate decoded strings longer than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_STRING_LENGTH)]
    max_string: usize,

    /// Print integers in hexadecimal
    #[arg(long, default_value_t = false)]
    hex: bool,

    /// Log level (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides LUAPROBE_LOG_FORMAT)
    #[arg(long)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Where target memory comes from
#[derive(Args, Debug)]
struct TargetArgs
{
    /// Process ID (PID) to read from
    #[arg(long, conflicts_with = "snapshot", required_unless_present = "snapshot")]
    pid: Option<u32>,

    /// Raw memory dump to read from instead of a live process
    #[arg(long, requires = "base")]
    snapshot: Option<PathBuf>,

    /// Address the first byte of the dump was mapped at (hex format: 0x1000 or decimal)
    #[arg(long, value_parser = parse_address)]
    base: Option<Address>,

    /// Pointer width of the dumped process in bytes (4 or 8)
    #[arg(long, default_value_t = 8)]
    pointer_width: u8,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Decode the TValue stored at an address
    Value
    {
        /// Address of the TValue (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Decode an array of consecutive TValues
    Values
    {
        /// Address of the first TValue
        #[arg(value_parser = parse_address)]
        address: Address,
        /// Number of values to decode
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Decode a string object (TString)
    String
    {
        /// Address of the TString
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Show the prototype, source and nested functions of a Lua closure
    Function
    {
        /// Address of the Lua closure
        #[arg(value_parser = parse_address)]
        address: Address,
        /// lua_State the closure belongs to, used as the symbol table key
        #[arg(long, value_parser = parse_address, default_value = "0")]
        state: Address,
    },
}

fn main() -> ExitCode
{
    let cli = Cli::parse();

    let _guard = match init_cli_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_cli_logging(cli: &Cli) -> Result<LoggingGuard, LoggingError>
{
    let mut config = LoggingConfig::from_env()?;
    if cli.log_level.is_some() {
        config.level = cli.log_level;
    }
    if let Some(format) = cli.log_format {
        config.format = format;
    }
    config.init()
}

/// Parse `0x`-prefixed hex or plain decimal
fn parse_address(s: &str) -> Result<Address, String>
{
    let trimmed = s.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse::<u64>(),
    };
    parsed
        .map(Address::from)
        .map_err(|e| format!("invalid address '{s}': {e}"))
}

fn open_target(target: &TargetArgs) -> ProbeResult<Box<dyn MemoryAccessor>>
{
    match (&target.snapshot, target.pid) {
        (Some(path), _) => {
            let base = target.base.unwrap_or(Address::NULL);
            let width = PointerWidth::try_from(target.pointer_width)?;
            info!(path = %path.display(), %base, ?width, "opening memory snapshot");
            Ok(Box::new(SnapshotMemory::from_file(path, base, width)?))
        }
        (None, Some(pid)) => {
            info!(pid, "attaching to process");
            attach_process(pid)
        }
        (None, None) => Err(ProbeError::InvalidArgument(
            "either --pid or --snapshot must be given".to_string(),
        )),
    }
}

fn run(cli: &Cli) -> ProbeResult<()>
{
    let memory = open_target(&cli.target)?;
    let memory = memory.as_ref();
    let options = DecodeOptions {
        version: cli.lua_version,
        max_string_length: cli.max_string,
    };
    let radix = if cli.hex { 16 } else { 10 };
    debug!(version = %options.version, max_string = options.max_string_length, "decoder configured");

    match cli.command {
        Commands::Value { address } => {
            let decoder = LuaDecoder::new(memory, options);
            println!("{}", format_value(&decoder.read_value(address), radix));
        }
        Commands::Values { address, count } => {
            let decoder = LuaDecoder::new(memory, options);
            for (index, value) in decoder.read_values(address, count).iter().enumerate() {
                println!("[{index}] {}", format_value(value, radix));
            }
        }
        Commands::String { address } => {
            let decoder = LuaDecoder::new(memory, options);
            println!("{}", format_value(&decoder.read_string(address), radix));
        }
        Commands::Function { address, state } => show_function(memory, options.version, address, state)?,
    }
    Ok(())
}

fn format_value(value: &LuaValue, radix: u32) -> String
{
    if value.is_error() {
        return format!("<error> {}", value.display(radix));
    }
    format!("{} = {}", value.lua_type_name(), value.display(radix))
}

fn show_function(memory: &dyn MemoryAccessor, version: LuaVersion, closure: Address, state: Address) -> ProbeResult<()>
{
    let function = LuaFunctionData::from_closure(memory, version, closure)?;
    let proto = function.address();

    let mut store = SymbolStore::new();
    let symbols = store.fetch_or_create(state);
    symbols.add_source_from_function(memory, function.clone());

    let Some(registered) = symbols.find_function(proto) else {
        println!("Function {proto} (closure {closure})");
        println!("  Source: unavailable");
        println!("  Lines: {}-{}", function.line_defined(), function.last_line_defined());
        return Ok(());
    };

    println!("Function {proto} (closure {closure})");
    println!(
        "  Source: {} ({} at {})",
        registered.display_source().unwrap_or("?"),
        registered.source().unwrap_or("?"),
        registered.source_address()
    );
    println!(
        "  Lines: {}-{}",
        registered.definition_start_line(),
        registered.definition_end_line()
    );
    println!(
        "  Params: {}{}",
        registered.num_params(),
        if registered.is_vararg() { " + ..." } else { "" }
    );
    println!("  Instructions: {}", registered.instruction_count());
    println!("  Nested functions: {}", registered.local_functions().len());
    for local in registered.local_functions() {
        println!("    {} lines {}-{}", local.address, local.line_defined, local.last_line_defined);
    }

    println!("\nSymbol table for state {state}:");
    for source in symbols.sources() {
        println!(
            "  {} at {}: {} function(s)",
            source.source_file_name(),
            source.address(),
            source.function_count()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid()
    {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_address()
    {
        assert_eq!(parse_address("0x1000"), Ok(Address::from(0x1000)));
        assert_eq!(parse_address("0XFF"), Ok(Address::from(0xff)));
        assert_eq!(parse_address("4096"), Ok(Address::from(4096)));
        assert_eq!(parse_address("0x7fff_0000"), Ok(Address::from(0x7fff_0000)));
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_snapshot_command()
    {
        let cli = Cli::try_parse_from([
            "luaprobe",
            "--snapshot",
            "dump.bin",
            "--base",
            "0x10000",
            "--pointer-width",
            "4",
            "--lua-version",
            "5.1",
            "--hex",
            "values",
            "0x10020",
            "--count",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.target.base, Some(Address::from(0x10000)));
        assert_eq!(cli.target.pointer_width, 4);
        assert_eq!(cli.lua_version, LuaVersion::Lua51);
        assert!(cli.hex);
        assert!(matches!(cli.command, Commands::Values { count: 3, .. }));
    }

    #[test]
    fn test_target_is_required()
    {
        assert!(Cli::try_parse_from(["luaprobe", "value", "0x10"]).is_err());
        assert!(Cli::try_parse_from(["luaprobe", "--snapshot", "dump.bin", "value", "0x10"]).is_err());
        assert!(Cli::try_parse_from(["luaprobe", "--pid", "1", "--snapshot", "d", "--base", "0", "value", "0"]).is_err());
    }

    #[test]
    fn test_run_against_snapshot()
    {
        // Lua 5.3 integer 255 at the start of the dump.
        let mut dump = 255i64.to_le_bytes().to_vec();
        dump.extend_from_slice(&0x13i32.to_le_bytes());
        dump.extend_from_slice(&[0; 4]);
        let path = std::env::temp_dir().join(format!("luaprobe-cli-{}.bin", std::process::id()));
        fs::write(&path, &dump).unwrap();

        let cli = Cli::try_parse_from([
            "luaprobe",
            "--snapshot",
            path.to_str().unwrap(),
            "--base",
            "0x1000",
            "values",
            "0x1000",
            "--count",
            "2",
        ])
        .unwrap();
        let result = run(&cli);
        fs::remove_file(&path).unwrap();
        result.unwrap();
    }

    #[test]
    fn test_unreadable_closure_is_an_error()
    {
        let memory = SnapshotMemory::new(PointerWidth::Eight);
        let err = show_function(&memory, LuaVersion::Lua53, Address::from(0x10), Address::NULL).unwrap_err();
        assert!(matches!(err, ProbeError::StructUnreadable { .. }));
    }

    #[test]
    fn test_format_value()
    {
        assert_eq!(format_value(&LuaValue::integer(255), 16), "int = ff");
        assert_eq!(format_value(&LuaValue::error("bad tag"), 10), "<error> bad tag");
    }
}
