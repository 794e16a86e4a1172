//! The per-epoch validation loop.

use crate::config::TrainArgs;
use crate::loss::TextLoss;
use crate::metrics::AverageMeter;
use crate::summary::SummaryWriter;
use crate::trainer::append_term_logs;
use crate::viz::visualize_network_output;
use anyhow::Context;
use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use models::TextNet;
use snake_dataset::BatchIter;

/// Run the held-out set through the model on the inner (non-autodiff)
/// backend: no gradients, no parameter updates, no checkpoints. Per-term
/// averages go to the scalar sink once at the end, tagged `val` with the
/// epoch as the step.
pub fn validate<B>(
    model: &TextNet<B>,
    loader: &mut BatchIter,
    criterion: &TextLoss,
    epoch: usize,
    args: &TrainArgs,
    summary: &mut SummaryWriter,
    device: &<B::InnerBackend as Backend>::Device,
) -> anyhow::Result<()>
where
    B: AutodiffBackend,
{
    let save_dir = args.experiment_dir();
    let model = model.valid();

    let mut losses = AverageMeter::default();
    let mut tr_losses = AverageMeter::default();
    let mut tcl_losses = AverageMeter::default();
    let mut sin_losses = AverageMeter::default();
    let mut cos_losses = AverageMeter::default();
    let mut radii_losses = AverageMeter::default();

    loader.reset();
    let mut i = 0usize;
    while let Some(batch) = loader
        .next_batch::<B::InnerBackend>(args.batch_size, device)
        .context("loading validation batch")?
    {
        let output = model.forward(batch.images.clone());
        let vals = criterion.forward(output.clone(), &batch).values();

        losses.update(vals.total as f64);
        tr_losses.update(vals.tr as f64);
        tcl_losses.update(vals.tcl as f64);
        sin_losses.update(vals.sin as f64);
        cos_losses.update(vals.cos as f64);
        radii_losses.update(vals.radii as f64);

        if args.viz && i % args.viz_freq == 0 {
            visualize_network_output(
                &output,
                &batch.tr_mask,
                &batch.tcl_mask,
                "val",
                &save_dir,
                epoch,
                i,
            )?;
        }

        if i % args.display_freq == 0 {
            println!(
                "Validation: - Loss: {:.4} - tr_loss: {:.4} - tcl_loss: {:.4} - sin_loss: {:.4} - cos_loss: {:.4} - radii_loss: {:.4}",
                vals.total, vals.tr, vals.tcl, vals.sin, vals.cos, vals.radii
            );
            append_term_logs(&save_dir, epoch, "validation", &vals)?;
        }

        i += 1;
    }

    summary
        .write_scalars(
            &[
                ("loss", losses.average() as f32),
                ("tr_loss", tr_losses.average() as f32),
                ("tcl_loss", tcl_losses.average() as f32),
                ("sin_loss", sin_losses.average() as f32),
                ("cos_loss", cos_losses.average() as f32),
                ("radii_loss", radii_losses.average() as f32),
            ],
            "val",
            epoch,
        )
        .context("writing validation scalars")?;

    println!("Validation Loss: {}", losses.average());
    Ok(())
}
