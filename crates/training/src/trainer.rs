//! The per-epoch training loop.

use crate::checkpoint::{CheckpointManager, IterationLabel};
use crate::config::TrainArgs;
use crate::loss::{TermValues, TextLoss};
use crate::metrics::AverageMeter;
use crate::schedule::LrScheduler;
use crate::summary::SummaryWriter;
use crate::viz::visualize_network_output;
use anyhow::Context;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use models::TextNet;
use snake_dataset::BatchIter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Mutable state threaded through the whole run instead of living in a
/// process-wide global: the iteration counter used to tag training scalars.
/// It keeps increasing across epochs.
#[derive(Debug, Default)]
pub struct RunContext {
    pub train_step: usize,
}

/// Per-term append-only text logs: (file name, value selector).
const TERM_LOGS: [(&str, fn(&TermValues) -> f32); 6] = [
    ("tr_loss_result.txt", |v| v.tr),
    ("tcl_loss_result.txt", |v| v.tcl),
    ("sin_result.txt", |v| v.sin),
    ("cos_result.txt", |v| v.cos),
    ("radii_result.txt", |v| v.radii),
    ("loss_result.txt", |v| v.total),
];

/// Append one `<epoch>_<label>_<value>` line per term log file.
pub(crate) fn append_term_logs(
    dir: &Path,
    epoch: usize,
    label: &str,
    values: &TermValues,
) -> anyhow::Result<()> {
    for (file, select) in TERM_LOGS {
        let path = dir.join(file);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening term log {}", path.display()))?;
        writeln!(f, "{}_{}_{:.4}", epoch, label, select(values))
            .with_context(|| format!("appending to {}", path.display()))?;
    }
    Ok(())
}

/// Run one training epoch: forward, loss, backward, optimizer step per
/// batch, with interval-driven logging, visualization, and checkpointing.
/// Advances the scheduler exactly once at the end; the epoch-end checkpoint
/// is written first so it records the rate the epoch actually used.
#[allow(clippy::too_many_arguments)]
pub fn train_one_epoch<B, O>(
    mut model: TextNet<B>,
    loader: &mut BatchIter,
    criterion: &TextLoss,
    optim: &mut O,
    scheduler: &mut LrScheduler,
    epoch: usize,
    ctx: &mut RunContext,
    args: &TrainArgs,
    summary: &mut SummaryWriter,
    ckpt: &CheckpointManager,
    device: &B::Device,
) -> anyhow::Result<TextNet<B>>
where
    B: AutodiffBackend,
    O: Optimizer<TextNet<B>, B>,
{
    let save_dir = args.experiment_dir();
    let lr = scheduler.current_lr();
    let mut losses = AverageMeter::default();
    loader.reset();
    let num_batches = loader.num_batches(args.batch_size);

    println!("Epoch: {epoch} : LR = {lr}");

    let mut i = 0usize;
    while let Some(batch) = loader
        .next_batch::<B>(args.batch_size, device)
        .context("loading training batch")?
    {
        ctx.train_step += 1;

        let output = model.forward(batch.images.clone());
        let terms = criterion.forward(output.clone(), &batch);
        let loss = terms.total();

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(lr, model, grads);

        let vals = terms.values();
        losses.update(vals.total as f64);

        if args.viz && i % args.viz_freq == 0 {
            visualize_network_output(
                &output,
                &batch.tr_mask,
                &batch.tcl_mask,
                "train",
                &save_dir,
                epoch,
                i,
            )?;
        }

        if i % args.display_freq == 0 {
            println!(
                "({i} / {num_batches}) - Loss: {:.4} - tr_loss: {:.4} - tcl_loss: {:.4} - sin_loss: {:.4} - cos_loss: {:.4} - radii_loss: {:.4}",
                vals.total, vals.tr, vals.tcl, vals.sin, vals.cos, vals.radii
            );
            append_term_logs(&save_dir, epoch, &i.to_string(), &vals)?;
        }

        if i % args.save_iter_freq == 0 {
            let path = ckpt.save(&model, &*optim, epoch, lr, IterationLabel::Iter(i))?;
            println!("Saving to {}.", path.display());
        }

        if i % args.log_freq == 0 {
            summary
                .write_scalars(&vals.as_scalars(), "train", ctx.train_step)
                .context("writing training scalars")?;
        }

        i += 1;
    }

    if epoch % args.save_freq == 0 {
        let path = ckpt.save(&model, &*optim, epoch, lr, IterationLabel::End)?;
        println!("Saving to {}.", path.display());
    }

    println!("Training Loss: {}", losses.average());
    scheduler.step();

    Ok(model)
}
