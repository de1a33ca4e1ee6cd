//! Desktop application wiring: a thin Tauri 2 shell around the six core components (§2.1
//! "Ambient stack"). Grounded on the teacher's own `src/lib.rs` (kept its `setup` closure
//! shape, debug-only log plugin, `app.path().app_data_dir()` call); the `db`/singleton-init
//! wiring is replaced with ClusterRisk's own store initialisation.

mod aggregator;
mod commands;
mod config;
mod db;
mod diagnostics;
mod error;
mod fund_store;
mod geo;
mod history;
mod ingestion;
mod models;
mod normalize;
mod resolver;
mod scraper;
mod ticker_cache;

use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_shell::init())
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&app_data_dir)?;

            db::init_database(&app_data_dir.join("analyses.db"))?;
            fund_store::init(&app_data_dir.join("fund_details"))?;
            ticker_cache::init(&app_data_dir.join("ticker_cache.json"))?;
            resolver::user_overlay::init(&app_data_dir.join("user_etf_holdings.csv"))?;

            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Analysis run + history (§4.6, §4.7)
            commands::analysis::run_analysis,
            commands::analysis::list_analyses,
            commands::analysis::get_analysis,
            commands::analysis::delete_analysis,
            commands::analysis::clear_analyses,
            commands::analysis::get_analysis_timeline,
            // Fund-Detail Store + Scraper (§4.2, §4.3)
            commands::fund_detail::get_fund_detail,
            commands::fund_detail::list_fund_details,
            commands::fund_detail::scrape_fund_detail,
            commands::fund_detail::preview_fund_detail,
            commands::fund_detail::batch_update_fund_details,
            // Ticker->Sector Cache (§4.4)
            commands::ticker_cache::lookup_ticker_sector,
            commands::ticker_cache::batch_lookup_ticker_sector,
            commands::ticker_cache::manual_update_ticker_sector,
            commands::ticker_cache::clear_ticker_cache,
            commands::ticker_cache::ticker_cache_stats,
            // User-holdings overlay (§4.5)
            commands::overlay::get_user_overlay_template,
            commands::overlay::add_user_overlay_holdings,
            // Diagnostics buffer (§7)
            commands::diagnostics::get_diagnostics,
            commands::diagnostics::get_diagnostics_summary,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
