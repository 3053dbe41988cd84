//! Human-activity-recognition classifier training driver.

use std::process;

use clap::Parser;

use seqnet::cli::CommonArgs;
use seqnet::dataset::batch::make_batches;
use seqnet::dataset::discover::load_har_dataset;
use seqnet::driver::eval::evaluate_sequence;
use seqnet::driver::train::train_epoch_with_mode;
use seqnet::model::checkpoint::{load_chain, save_chain};
use seqnet::model::build_chain;
use seqnet::report::ConfusionMatrix;
use seqnet::schedule::LrSchedule;

const NUM_FEATURES: usize = 6;
const EXPANDED_FEATURES: usize = 3 * NUM_FEATURES;
const NUM_CLASSES: usize = 12;
const BLANK: usize = 0;

#[derive(Parser)]
#[command(about = "Train a stacked LSTM classifier on human-activity-recognition sensor data")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Label file (space-separated experiment/subject/activity/start/end).
    #[arg(long = "labels")]
    labels: std::path::PathBuf,

    /// `stateful` carries hidden state across batches; `stateless` resets
    /// at every batch boundary.
    #[arg(short = 'S', long = "state-mode", default_value = "stateless")]
    state_mode: String,

    /// Learning-rate schedule overriding `-e`/`-r`/`-w`.
    #[arg(long = "schedule")]
    schedule: Option<String>,

    /// Where to write the confusion-matrix CSV.
    #[arg(long = "confusion-csv")]
    confusion_csv: Option<std::path::PathBuf>,
}

fn main() {
    let args = Args::parse();

    let stateful = match args.state_mode.as_str() {
        "stateful" => true,
        "stateless" => false,
        other => {
            eprintln!("error: -S must be 'stateful' or 'stateless', got '{other}'");
            process::exit(1);
        }
    };

    eprintln!("har-train");
    eprintln!("  loading dataset...");
    let dataset = match load_har_dataset(&args.common.input_dir, &args.labels, NUM_FEATURES) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    if dataset.sequences.is_empty() {
        eprintln!("error: no usable segments found");
        process::exit(1);
    }

    let hidden_sizes = args.common.hidden_sizes();
    let mut chain = match &args.common.load {
        Some(dir) => match load_chain(dir) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: failed to load checkpoint: {e}");
                process::exit(1);
            }
        },
        None => build_chain(EXPANDED_FEATURES, &hidden_sizes, NUM_CLASSES),
    };

    let (train_batch, test_batch) = args.common.batch_sizes();
    let split_at = (dataset.sequences.len() * 9 / 10).max(1);
    let mut sequences = dataset.sequences;
    let test_sequences = sequences.split_off(split_at.min(sequences.len()));

    let schedule = args.schedule.as_deref().map(LrSchedule::parse);
    if let Some(Err(e)) = &schedule {
        eprintln!("error: invalid --schedule: {e}");
        process::exit(1);
    }
    let total_epochs = match &schedule {
        Some(Ok(s)) => s.total_epochs(),
        _ => args.common.epochs,
    };

    eprintln!(
        "  corpus    {} train segments, {} test segments ({})",
        sequences.len(),
        test_sequences.len(),
        args.state_mode
    );
    eprintln!();

    for epoch in 0..total_epochs {
        let (lr, wd) = match &schedule {
            Some(Ok(s)) => {
                let phase = s.phase_at(epoch);
                (phase.lr, phase.weight_decay)
            }
            _ => (args.common.lr, args.common.weight_decay),
        };

        let batches = make_batches(&sequences, train_batch, EXPANDED_FEATURES, NUM_CLASSES, BLANK);
        let result = train_epoch_with_mode(&mut chain, &batches, lr, wd, BLANK, stateful);

        eprintln!(
            "  epoch {}/{} | lr {:.6} | loss {:.4} | acc {:.4}",
            epoch + 1,
            total_epochs,
            lr,
            result.avg_loss,
            result.avg_accuracy
        );
    }

    eprintln!("  testing...");
    let test_batches = make_batches(&test_sequences, test_batch, EXPANDED_FEATURES, NUM_CLASSES, BLANK);
    let mut confusion = ConfusionMatrix::new((0..NUM_CLASSES).map(|c| c.to_string()).collect());
    let mut raw_sum = 0.0f32;
    let mut phoneme_sum = 0.0f32;
    let mut beam_sum = 0.0f32;
    let mut count = 0usize;

    for batch in &test_batches {
        for slot in 0..batch.x.len() {
            let result = evaluate_sequence(&mut chain, &batch.x[slot], &batch.y[slot], 4, BLANK, &mut confusion);
            raw_sum += result.raw_similarity;
            phoneme_sum += result.phoneme_similarity;
            beam_sum += result.beam_similarity;
            count += 1;
        }
    }

    let denom = count.max(1) as f32;
    eprintln!(
        "  test      raw {:.4} | activity {:.4} | beam {:.4}",
        raw_sum / denom,
        phoneme_sum / denom,
        beam_sum / denom
    );

    if let Some(path) = &args.confusion_csv {
        if let Err(e) = std::fs::write(path, confusion.to_csv()) {
            eprintln!("warning: failed to write confusion matrix: {e}");
        }
    }

    if let Some(dir) = &args.common.store {
        if let Err(e) = save_chain(&chain, dir) {
            eprintln!("error: failed to save checkpoint: {e}");
            process::exit(1);
        }
    }

    eprintln!("done");
}
