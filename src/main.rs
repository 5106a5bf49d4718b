use clap::{Arg, ArgAction, Command, value_parser};
use clap_num::maybe_hex;
use exhume_body::{Body, BodySlice};
use exhume_mft::{DecodeOptions, FixupMode, MftReader, MftRecord};
use log::{debug, error, info};
use serde_json::{Value, json};

fn print_record(record: &MftRecord, json_output: bool) {
    if json_output {
        match serde_json::to_string_pretty(&record.to_json()) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("Error serializing record to JSON: {}", e),
        }
    } else {
        println!("{}", record);
    }
}

fn main() {
    let matches = Command::new("exhume_mft")
        .version("0.1.0")
        .author("ForensicXlab")
        .about("Decode the master file table records of an ntfs filesystem.")
        .arg(
            Arg::new("body")
                .short('b')
                .long("body")
                .value_parser(value_parser!(String))
                .required(true)
                .help("The path to the body to exhume."),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_parser(value_parser!(String))
                .required(false)
                .help("The format of the file, either 'raw' or 'ewf'."),
        )
        .arg(
            Arg::new("offset")
                .short('o')
                .long("offset")
                .value_parser(maybe_hex::<u64>)
                .required(true)
                .help("The NTFS partition starts at address (decimal or hex)."),
        )
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_parser(maybe_hex::<u64>)
                .required(true)
                .help("The size of the NTFS partition in sectors (decimal or hex)."),
        )
        .arg(
            Arg::new("pbs")
                .long("pbs")
                .action(ArgAction::SetTrue)
                .help("Display the partition boot sector information."),
        )
        .arg(
            Arg::new("cluster")
                .long("cluster")
                .value_parser(maybe_hex::<u64>)
                .help("Decode the MFT record stored at this absolute cluster."),
        )
        .arg(
            Arg::new("entry")
                .short('e')
                .long("entry")
                .value_parser(maybe_hex::<u64>)
                .help("Decode the MFT entry with this record number."),
        )
        .arg(
            Arg::new("scan")
                .long("scan")
                .value_parser(maybe_hex::<u64>)
                .help("Decode the first N MFT entries, reporting failures and moving on."),
        )
        .arg(
            Arg::new("apply_fixups")
                .long("apply-fixups")
                .action(ArgAction::SetTrue)
                .help("Restore the sector ends from the fixup array before decoding attributes."),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Output certain structures (pbs, records) in JSON format."),
        )
        .arg(
            Arg::new("log_level")
                .short('l')
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info")
                .help("Set the log verbosity level"),
        )
        .get_matches();

    // Initialize logger.
    let log_level_str = matches
        .get_one::<String>("log_level")
        .map(String::as_str)
        .unwrap_or("info");
    let level_filter = match log_level_str {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };
    env_logger::Builder::new().filter_level(level_filter).init();

    let Some(file_path) = matches.get_one::<String>("body") else {
        error!("A body is required.");
        return;
    };
    let auto = String::from("auto");
    let format = matches.get_one::<String>("format").unwrap_or(&auto);
    let offset = matches.get_one::<u64>("offset").copied().unwrap_or(0);
    let size = matches.get_one::<u64>("size").copied().unwrap_or(0);
    let show_pbs = matches.get_flag("pbs");
    let json_output = matches.get_flag("json");
    let options = DecodeOptions {
        fixups: if matches.get_flag("apply_fixups") {
            FixupMode::Apply
        } else {
            FixupMode::Report
        },
    };

    // 1) Prepare the "body" and open the volume.
    let mut body = Body::new(file_path.to_owned(), format);
    debug!("Created Body from '{}'", file_path);

    let partition_size = size * body.get_sector_size() as u64;
    let mut slice = match BodySlice::new(&mut body, offset, partition_size) {
        Ok(sl) => sl,
        Err(e) => {
            error!("Could not create BodySlice: {}", e);
            return;
        }
    };

    let mut reader = match MftReader::new(&mut slice) {
        Ok(r) => r.with_options(options),
        Err(e) => {
            error!("Couldn't open NTFS: {}", e);
            return;
        }
    };

    if show_pbs {
        if json_output {
            match serde_json::to_string_pretty(&reader.pbs.to_json()) {
                Ok(s) => println!("{}", s),
                Err(e) => error!("Error serializing PBS to JSON: {}", e),
            }
        } else {
            println!("{}", reader.pbs);
        }
    }

    if let Some(cluster) = matches.get_one::<u64>("cluster").copied() {
        match reader.record_at_cluster(cluster) {
            Ok(record) => print_record(&record, json_output),
            Err(e) => error!("Cannot decode the record at cluster {}: {}", cluster, e),
        }
    }

    if let Some(entry) = matches.get_one::<u64>("entry").copied() {
        match reader.entry(entry) {
            Ok(record) => print_record(&record, json_output),
            Err(e) => error!("Cannot decode MFT entry {}: {}", entry, e),
        }
    }

    if let Some(count) = matches.get_one::<u64>("scan").copied() {
        let total = match reader.entry_count() {
            Ok(t) => t,
            Err(e) => {
                error!("Cannot load the $MFT run-list: {}", e);
                return;
            }
        };
        let results = match reader.scan(0..count.min(total)) {
            Ok(r) => r,
            Err(e) => {
                error!("Scan failed: {}", e);
                return;
            }
        };
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(
            "Scanned {} of {} entries, {} failed.",
            results.len(),
            total,
            failed
        );

        if json_output {
            let arr: Vec<Value> = results
                .iter()
                .map(|(id, r)| match r {
                    Ok(rec) => json!({ "entry": id, "record": rec.to_json() }),
                    Err(e) => json!({ "entry": id, "error": e.to_string() }),
                })
                .collect();
            match serde_json::to_string_pretty(&json!({ "entries": arr })) {
                Ok(s) => println!("{}", s),
                Err(e) => error!("Error serializing scan to JSON: {}", e),
            }
        } else {
            for (id, r) in results {
                match r {
                    Ok(rec) => println!(
                        "{}  {}  {}",
                        id,
                        if rec.is_dir() { "d" } else { "-" },
                        rec.primary_name().unwrap_or("<no name>")
                    ),
                    Err(e) => println!("{}  !  {}", id, e),
                }
            }
        }
    }
}
