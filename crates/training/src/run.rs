//! Orchestration: wiring loaders, model, loss, optimizer, schedule, and the
//! epoch loop together.

use crate::checkpoint::CheckpointManager;
use crate::config::{BackendKind, TrainArgs};
use crate::loss::TextLoss;
use crate::schedule::{LrPolicy, LrScheduler};
use crate::summary::SummaryWriter;
use crate::trainer::{train_one_epoch, RunContext};
use crate::validate::validate;
use crate::TrainBackend;
use anyhow::Context;
use burn::backend::Autodiff;
use burn::module::Module;
use burn::optim::{AdamConfig, Optimizer};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use models::{TextNet, TextNetConfig};
use snake_dataset::DatasetVariant;

type ADBackend = Autodiff<TrainBackend>;

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            println!("note: built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    args.validate()?;
    validate_backend_choice(args.backend)?;

    let device = <ADBackend as Backend>::Device::default();
    let variant = args.dataset.variant();

    let (mut train_loader, mut val_loader) = variant
        .build_loaders(&args.data_root, &args.loader_config())
        .with_context(|| format!("building loaders under {}", args.data_root.display()))?;

    let save_dir = args.experiment_dir();
    std::fs::create_dir_all(&save_dir)
        .with_context(|| format!("creating {}", save_dir.display()))?;
    let mut summary = SummaryWriter::create(&args.log_dir, &args.exp_name)
        .context("creating scalar summary writer")?;

    let backbone = args.backbone.to_backbone();
    let mut model = TextNet::<ADBackend>::new(TextNetConfig::new(backbone), &device);
    let mut optim = AdamConfig::new().init();
    let ckpt = CheckpointManager::new(&args.save_dir, &args.exp_name, backbone.as_str());

    if let Some(path) = &args.resume {
        let record = CheckpointManager::load(path)?;
        println!(
            "Loading from {} (epoch {}, lr {}).",
            path.display(),
            record.epoch,
            record.lr
        );
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let model_record = recorder
            .load(record.model_bytes.clone(), &device)
            .with_context(|| format!("decoding model record from {}", path.display()))?;
        model = model.load_record(model_record);
        let optim_record = recorder
            .load(record.optimizer_bytes.clone(), &device)
            .with_context(|| format!("decoding optimizer record from {}", path.display()))?;
        optim = optim.load_record(optim_record);
    }

    let criterion = TextLoss;
    let policy = match variant {
        DatasetVariant::SynthText => LrPolicy::Fixed,
        DatasetVariant::TotalText => LrPolicy::step_decay_default(),
    };
    let mut scheduler = LrScheduler::new(policy, args.lr);
    let mut ctx = RunContext::default();

    println!("Start training TextSnake.");
    for epoch in args.start_epoch..args.max_epoch {
        model = train_one_epoch(
            model,
            &mut train_loader,
            &criterion,
            &mut optim,
            &mut scheduler,
            epoch,
            &mut ctx,
            &args,
            &mut summary,
            &ckpt,
            &device,
        )?;
        if let Some(val) = val_loader.as_mut() {
            validate(
                &model,
                val,
                &criterion,
                epoch,
                &args,
                &mut summary,
                &device,
            )?;
        }
    }
    println!("End.");
    Ok(())
}
