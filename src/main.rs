// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::Path;

use materials_budget::cli::{Args, Command};
use materials_budget::logging::{init_logging, LogTarget};
use materials_budget::{format_price, BudgetStore, Config, Confirmation, KeyValueStore};

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args);
    let command = args.command.unwrap_or(Command::Ui);

    let log_target = if command == Command::Ui {
        LogTarget::File(config.log_file.clone())
    } else {
        LogTarget::Stderr
    };
    init_logging(&log_target)?;

    let store = BudgetStore::load(config.open_store()?);

    match command {
        Command::Ui => run_ui_mode(store, &config)?,
        Command::Summary => run_summary(&store),
        Command::Export { out } => run_export(&store, &out)?,
        Command::Clear { yes } => run_clear(store, yes)?,
    }

    Ok(())
}

fn run_summary<S: KeyValueStore>(store: &BudgetStore<S>) {
    println!("💰 Presupuesto de Materiales (v{})", materials_budget::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if store.is_empty() {
        println!("(sin materiales)");
    }

    for m in store.materials() {
        println!(
            "{} #{:<4} {:<30} {:>12} x {:<5} = {:>12}",
            if m.is_selected { "[x]" } else { "[ ]" },
            m.id,
            m.name,
            format_price(m.price),
            m.quantity,
            format_price(m.selected_total()),
        );
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Total de materiales: {} | Seleccionados: {}",
        store.len(),
        store.selected_count()
    );
    println!("Total del Presupuesto: {}", format_price(store.calculate_total()));
}

fn run_export<S: KeyValueStore>(store: &BudgetStore<S>, out: &Path) -> Result<()> {
    let snapshot = store.export_snapshot();
    let path = snapshot.write_to_dir(out)?;
    println!("📥 Exportado a {}", path.display());
    Ok(())
}

fn run_clear<S: KeyValueStore>(mut store: BudgetStore<S>, yes: bool) -> Result<()> {
    let confirmation = if yes {
        Confirmation::Confirmed
    } else {
        print!(
            "¿Estás seguro de que quieres limpiar todo el presupuesto? \
             Esta acción no se puede deshacer. (s/n) "
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        Confirmation::from_answer(&answer)
    };

    if store.clear_all(confirmation) {
        println!("🗑️  Presupuesto limpiado");
    } else {
        println!("Cancelado, no se borró nada");
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode<S: KeyValueStore>(store: BudgetStore<S>, config: &Config) -> Result<()> {
    let export_dir = std::env::current_dir().context("Failed to resolve current directory")?;
    let mut app = ui::App::new(store, export_dir);
    ui::run_ui(&mut app, config.refresh_interval)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode<S: KeyValueStore>(_store: BudgetStore<S>, _config: &Config) -> Result<()> {
    anyhow::bail!(
        "TUI mode not available. Rebuild with `--features tui` or use the summary/export/clear commands"
    )
}
