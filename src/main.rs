use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::Result;
use clap::Parser;
use covid19count::presenter::{self, Chart};
use covid19count::region::{report_unknown, write_regions};
use covid19count::{App, SeriesTable};
use tracing::info;

use crate::cli::{Cli, Commands};

mod cli;
mod logging;

// 整个流程是顺序执行的，单线程运行时就够了
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level)?;

    let app = App::new(cli.config())?;

    match cli.command {
        Commands::Plot(args) => {
            let options = args.options();
            let prepared = app.plot(&args.regions, &options).await?;
            report_unknown(&prepared.unknown, io::stderr().lock())?;

            if let Some(path) = &args.csv {
                std::fs::write(path, SeriesTable::try_from(&prepared.series)?.to_csv()?)?;
                info!("table written to {}", path.display());
            }
            if args.stdout {
                presenter::print_table(&prepared.series, io::stdout().lock())?;
            } else {
                let chart = Chart::for_plot(&options, args.chart_kind(), args.log, prepared.as_of);
                presenter::render(&prepared.series, &chart, &args.outfile)?;
            }
        }
        Commands::ListRegions { stdout, outfile } => {
            let dataset = app.dataset().await?;
            if stdout {
                write_regions(&dataset, io::stdout().lock())?;
            } else {
                write_regions(&dataset, BufWriter::new(File::create(&outfile)?))?;
                info!("regions written to {}", outfile.display());
            }
        }
        Commands::Fatality {
            regions,
            outfile,
            stdout,
        } => {
            let prepared = app.fatality(&regions).await?;
            report_unknown(&prepared.unknown, io::stderr().lock())?;
            if stdout {
                presenter::print_table(&prepared.series, io::stdout().lock())?;
            } else {
                let chart = Chart::for_fatality(prepared.as_of);
                presenter::render(&prepared.series, &chart, &outfile)?;
            }
        }
    }

    Ok(())
}
