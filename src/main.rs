use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use doctv::client::HttpTransport;
use doctv::controller::Controller;
use doctv::domain::{DocError, TVConfig};
use doctv::logging::init_file_logging;
use doctv::model::{Model, Status};
use doctv::ui;

#[derive(Parser, Debug)]
#[command(version, about = "A tui based client for a small REST document store.")]
struct Args {
    /// Base URL of the document store server
    #[arg(short, long, env = "DOCTV_URL", default_value = "http://localhost:5000")]
    url: String,

    /// Collection to work on
    #[arg(short, long, env = "DOCTV_COLLECTION", default_value = "items")]
    collection: String,

    /// Log file, `~` and env vars are expanded
    #[arg(long, env = "DOCTV_LOG_FILE", default_value = "~/.cache/doctv/doctv.log")]
    log_file: PathBuf,

    /// Fields holding base64 images
    #[arg(long, value_delimiter = ',', default_value = "image")]
    image_fields: Vec<String>,

    /// Fields holding lists of sub-records
    #[arg(long, value_delimiter = ',', default_value = "gardens,room_data")]
    subtable_fields: Vec<String>,

    /// Field used to label popups
    #[arg(long, default_value = "address")]
    label_field: String,

    /// Characters shown for large payload fields
    #[arg(long, default_value_t = 50)]
    truncate: usize,
}

impl Args {
    fn into_config(self) -> TVConfig {
        TVConfig::default()
            .base_url(self.url)
            .collection(self.collection)
            .large_payload_fields(self.image_fields.clone())
            .image_fields(self.image_fields)
            .subtable_fields(self.subtable_fields)
            .label_field(self.label_field)
            .truncate_len(self.truncate)
            .log_file(Some(self.log_file))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = run(args.into_config());
    ratatui::restore();
    match result {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cfg: TVConfig) -> Result<(), DocError> {
    if let Some(path) = &cfg.log_file {
        init_file_logging(path)?;
    }
    info!("Starting doctv against {}", cfg.endpoint());

    let transport = HttpTransport::new()?;
    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    let mut model = Model::init(
        &cfg,
        Box::new(transport),
        size.width as usize,
        size.height as usize,
    )?;
    let controller = Controller::new(&cfg);

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui::draw(&model, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        }
    }

    info!("Bye");
    Ok(())
}
