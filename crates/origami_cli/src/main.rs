//! CLI smoke entry point.
//!
//! Usage: `origami_cli [DB_PATH] [LOG_DIR]`
//!
//! # Responsibility
//! - Verify `origami_core` linkage and storage bootstrap end to end.
//! - Print the `create` step of a fresh origami as JSON.

use log::info;
use origami_core::{
    default_log_level, init_logging, open_db, open_db_in_memory, OrigamiService,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("origami_core ping={}", origami_core::ping());
    println!("origami_core version={}", origami_core::core_version());

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("origami_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let db_path = args.first();
    if let Some(log_dir) = args.get(1) {
        init_logging(default_log_level(), log_dir)?;
    }

    let conn = match db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let service = OrigamiService::new(&conn);
    let (origami_id, create_step) = service.create_origami()?;
    info!("event=cli_probe module=cli status=ok origami_id={origami_id}");

    println!("origami_id={origami_id}");
    println!("{}", serde_json::to_string_pretty(&create_step)?);
    Ok(())
}
