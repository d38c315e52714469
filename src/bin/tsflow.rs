extern crate clap;
extern crate env_logger;
extern crate tsflow;

#[macro_use]
extern crate log;

use clap::{App, Arg, ArgMatches};
use std::collections::VecDeque;
use std::env;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader};
use std::num::{ParseFloatError, ParseIntError};
use std::sync::Arc;
use tsflow::execute::cache::TableBuilderCache;
use tsflow::execute::{
    AccumulationMode, Administration, Allocator, ExecuteError, Message, Pipeline,
    ProcedureSpec, Registry, ResultCollector, Results, Source, Trigger,
};
use tsflow::functions::aggregate::AggregateConfig;
use tsflow::functions::dedup::{DedupPolicy, DedupSpec};
use tsflow::functions::predict_linear::PredictLinearSpec;
use tsflow::functions::shift::ShiftSpec;
use tsflow::functions::unique::UniqueSpec;
use tsflow::table::{col_idx, ColListTable, ColMeta, DataType, GroupKey, Table, Value};
use tsflow::time::clock::SystemClock;
use tsflow::time::{Duration, Time};

fn main() -> Result<(), Error> {
    init_logger();
    let args = parse_args()?;
    let tables = read_tables(&args.input, &args.key)?;
    info!("Loaded {} tables from {}", tables.len(), args.input);

    let alloc = match args.memory_limit {
        Some(limit) => Allocator::new(limit),
        None => Allocator::unlimited(),
    };
    let admin = Administration::new(alloc, Arc::new(SystemClock::new()));
    let results = Results::new();
    let head = Registry::with_builtins().build_chain(
        &[args.spec],
        args.mode,
        Trigger::default(),
        &admin,
        Box::new(ResultCollector::new(results.clone())),
    )?;
    let source = TableSource {
        tables: tables.into_iter().collect(),
    };
    Pipeline::new(Box::new(source), head, &admin).run()?;
    print_tables(&results.take()?);
    Ok(())
}

fn init_logger() {
    if let Err(_) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "tsflow=info");
    }
    env_logger::init();
}

struct TableSource {
    tables: VecDeque<ColListTable>,
}

impl Source for TableSource {
    fn next_message(&mut self) -> Result<Option<Message>, ExecuteError> {
        Ok(self
            .tables
            .pop_front()
            .map(|t| Message::Process(Box::new(t))))
    }
}

#[derive(Debug)]
struct Args {
    input: String,
    key: Vec<String>,
    spec: ProcedureSpec,
    mode: AccumulationMode,
    memory_limit: Option<usize>,
}

fn parse_args() -> Result<Args, Error> {
    let matches = App::new("tsflow")
        .about("Run one dataflow operator over a typed CSV file")
        .arg(Arg::with_name("INPUT")
            .short("i")
            .long("input")
            .takes_value(true)
            .required(true)
            .help("CSV file whose header cells are label:type (types: bool, int, uint, float, string, time)"))
        .arg(Arg::with_name("KEY")
            .short("k")
            .long("key")
            .takes_value(true)
            .help("Comma-separated group key columns"))
        .arg(Arg::with_name("OP")
            .long("op")
            .takes_value(true)
            .required(true)
            .possible_values(&["dedup", "unique", "sum", "mean", "count", "shift", "predict-linear"])
            .help("Operator to run"))
        .arg(Arg::with_name("COLUMNS")
            .short("c")
            .long("columns")
            .takes_value(true)
            .help("Comma-separated columns the operator reads"))
        .arg(Arg::with_name("ALL")
            .long("all")
            .help("unique: check every column, keeping rows with any value not seen before"))
        .arg(Arg::with_name("SHIFT")
            .long("shift")
            .takes_value(true)
            .help("shift: offset in nanoseconds, may be negative (default 0)"))
        .arg(Arg::with_name("WANTED")
            .long("wanted")
            .takes_value(true)
            .help("predict-linear: target value"))
        .arg(Arg::with_name("ACCUMULATING")
            .long("accumulating")
            .help("Keep flushed partitions and retract them when updated"))
        .arg(Arg::with_name("MEMORY_LIMIT")
            .long("memory-limit")
            .takes_value(true)
            .help("Maximum bytes buffered by operators (default unlimited)"))
        .get_matches();

    let input = matches.value_of("INPUT").unwrap_or_default().to_string();
    let key = split_list(matches.value_of("KEY"));
    let spec = parse_spec(&matches)?;
    let mode = if matches.is_present("ACCUMULATING") {
        AccumulationMode::Accumulating
    } else {
        AccumulationMode::Discarding
    };
    let memory_limit = match matches.value_of("MEMORY_LIMIT") {
        Some(s) => Some(s.parse::<usize>()?),
        None => None,
    };

    Ok(Args {
        input,
        key,
        spec,
        mode,
        memory_limit,
    })
}

fn parse_spec(matches: &ArgMatches) -> Result<ProcedureSpec, Error> {
    let columns = split_list(matches.value_of("COLUMNS"));
    let aggregate = || {
        let mut config = AggregateConfig::default();
        if !columns.is_empty() {
            config.columns = columns.clone();
        }
        config
    };
    let spec = match matches.value_of("OP").unwrap_or_default() {
        "dedup" => match columns.first() {
            Some(column) => ProcedureSpec::Dedup(DedupSpec {
                policy: DedupPolicy::UniqueColumn {
                    column: column.clone(),
                },
            }),
            None => ProcedureSpec::Dedup(DedupSpec::default()),
        },
        "unique" => {
            let mut spec = UniqueSpec::default();
            if let Some(column) = columns.first() {
                spec.column = column.clone();
            }
            spec.all = matches.is_present("ALL");
            ProcedureSpec::Unique(spec)
        }
        "sum" => ProcedureSpec::Sum(aggregate()),
        "mean" => ProcedureSpec::Mean(aggregate()),
        "count" => ProcedureSpec::Count(aggregate()),
        "shift" => {
            let mut spec = ShiftSpec::default();
            if !columns.is_empty() {
                spec.columns = columns.clone();
            }
            spec.shift = Duration(matches.value_of("SHIFT").unwrap_or("0").parse::<i64>()?);
            ProcedureSpec::Shift(spec)
        }
        "predict-linear" => {
            let wanted = matches
                .value_of("WANTED")
                .ok_or(Error::ArgError("predict-linear requires --wanted"))?
                .parse::<f64>()?;
            let mut spec = PredictLinearSpec::new(wanted);
            if !columns.is_empty() {
                spec.columns = columns.clone();
            }
            ProcedureSpec::PredictLinear(spec)
        }
        _ => return Err(Error::ArgError("unknown operator")),
    };
    spec.validate()?;
    Ok(spec)
}

fn split_list(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Groups the rows of a typed CSV file into one table per distinct key, in first-seen order.
fn read_tables(path: &str, key_labels: &[String]) -> Result<Vec<ColListTable>, Error> {
    let mut lines = BufReader::new(File::open(path)?).lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Ok(Vec::new()),
    };
    let cols = header
        .split(',')
        .map(parse_col)
        .collect::<Result<Vec<ColMeta>, Error>>()?;
    let key_idx = key_labels
        .iter()
        .map(|l| col_idx(l, &cols).ok_or_else(|| ExecuteError::ColumnNotFound(l.clone())))
        .collect::<Result<Vec<usize>, ExecuteError>>()?;
    let key_cols: Vec<ColMeta> = key_idx.iter().map(|&j| cols[j].clone()).collect();

    let mut cache = TableBuilderCache::new(Allocator::unlimited());
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != cols.len() {
            return Err(Error::Parse(format!("expected {} cells: {}", cols.len(), line)));
        }
        let row = cols
            .iter()
            .zip(cells.iter())
            .map(|(c, cell)| parse_value(c.data_type, cell.trim()))
            .collect::<Result<Vec<Value>, Error>>()?;
        let values = key_idx.iter().map(|&j| row[j].clone()).collect();
        let key = GroupKey::new(key_cols.clone(), values)
            .ok_or_else(|| Error::Parse(format!("invalid key in row: {}", line)))?;
        let (builder, created) = cache.table_builder(&key);
        if created {
            builder.add_table_cols(&cols)?;
        }
        for (j, v) in row.iter().enumerate() {
            builder.append_value(j, v)?;
        }
    }

    let mut tables = Vec::with_capacity(cache.len());
    for key in cache.keys() {
        if let Some(builder) = cache.remove(&key) {
            tables.push(builder.into_table()?);
        }
    }
    Ok(tables)
}

fn parse_col(cell: &str) -> Result<ColMeta, Error> {
    let mut parts = cell.trim().splitn(2, ':');
    let label = parts.next().unwrap_or_default();
    let data_type = parts
        .next()
        .ok_or_else(|| Error::Parse(format!("header cell {:?} must be label:type", cell)))?
        .parse::<DataType>()
        .map_err(Error::Parse)?;
    Ok(ColMeta::new(label, data_type))
}

fn parse_value(data_type: DataType, s: &str) -> Result<Value, Error> {
    let v = match data_type {
        DataType::Bool => match s {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(Error::Parse(format!("invalid bool {:?}", s))),
        },
        DataType::Int => Value::Int(s.parse::<i64>()?),
        DataType::UInt => Value::UInt(s.parse::<u64>()?),
        DataType::Float => Value::Float(s.parse::<f64>()?),
        DataType::String => Value::String(s.to_string()),
        DataType::Time => Value::Time(Time(s.parse::<i64>()?)),
    };
    Ok(v)
}

fn print_tables(tables: &[ColListTable]) {
    for t in tables {
        println!("Table: {}", t.key());
        let labels: Vec<String> = t
            .cols()
            .iter()
            .map(|c| format!("{}:{}", c.label, c.data_type))
            .collect();
        println!("{}", labels.join("\t"));
        for row in t.rows() {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("{}", cells.join("\t"));
        }
        println!();
    }
}

#[derive(Debug)]
enum Error {
    IOError(io::Error),
    ParseIntError(ParseIntError),
    ParseFloatError(ParseFloatError),
    Parse(String),
    ArgError(&'static str),
    ExecuteError(ExecuteError),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IOError(err)
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Error {
        Error::ParseIntError(err)
    }
}

impl From<ParseFloatError> for Error {
    fn from(err: ParseFloatError) -> Error {
        Error::ParseFloatError(err)
    }
}

impl From<ExecuteError> for Error {
    fn from(err: ExecuteError) -> Error {
        Error::ExecuteError(err)
    }
}
