use burn::backend::Autodiff;
use burn::module::Module;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::{Distribution, Tensor};
use models::{Backbone, TextNet, TextNetConfig};
use training::{CheckpointError, CheckpointManager, IterationLabel};

type B = Autodiff<burn_ndarray::NdArray<f32>>;

fn trained_pair() -> (TextNet<B>, impl Optimizer<TextNet<B>, B>) {
    let device = Default::default();
    let model = TextNet::<B>::new(TextNetConfig::new(Backbone::VggSlim), &device);
    let mut optim = AdamConfig::new().init();

    // One real step so the optimizer carries moment state.
    let input = Tensor::<B, 4>::random([1, 3, 8, 8], Distribution::Default, &device);
    let loss = model.forward(input).sum();
    let grads = GradientsParams::from_grads(loss.backward(), &model);
    let model = optim.step(1e-3, model, grads);
    (model, optim)
}

#[test]
fn save_then_load_round_trips_state() {
    let dir = tempfile::tempdir().unwrap();
    let device = Default::default();
    let (model, optim) = trained_pair();

    let mgr = CheckpointManager::new(dir.path(), "exp", Backbone::VggSlim.as_str());
    let path = mgr
        .save(&model, &optim, 3, 5e-4, IterationLabel::Iter(7))
        .unwrap();
    assert_eq!(
        path,
        dir.path().join("exp").join("textsnake_vgg_slim_3_7.pth")
    );

    let record = CheckpointManager::load(&path).unwrap();
    assert_eq!(record.epoch, 3);
    assert!((record.lr - 5e-4).abs() < f64::EPSILON);

    // Restoring into a fresh model must reproduce the saved parameters
    // exactly: re-encoding the restored record yields identical bytes.
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let fresh = TextNet::<B>::new(TextNetConfig::new(Backbone::VggSlim), &device);
    let restored = fresh.load_record(
        recorder
            .load(record.model_bytes.clone(), &device)
            .expect("model record decodes"),
    );
    let restored_bytes: Vec<u8> = recorder.record(restored.into_record(), ()).unwrap();
    assert_eq!(restored_bytes, record.model_bytes);

    // Optimizer state decodes and restores as well. Entry order inside the
    // record is not stable, so no byte-level comparison here.
    let fresh_optim = AdamConfig::new().init::<B, TextNet<B>>();
    let fresh_optim = fresh_optim.load_record(
        recorder
            .load(record.optimizer_bytes.clone(), &device)
            .expect("optimizer record decodes"),
    );
    let optim_bytes: Vec<u8> = recorder.record(fresh_optim.to_record(), ()).unwrap();
    assert!(!optim_bytes.is_empty());
}

#[test]
fn no_tmp_file_remains_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let (model, optim) = trained_pair();
    let mgr = CheckpointManager::new(dir.path(), "exp", "vgg_slim");
    mgr.save(&model, &optim, 0, 1e-4, IterationLabel::End)
        .unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path().join("exp"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["textsnake_vgg_slim_0_end.pth"]);
}

#[test]
fn garbage_file_is_reported_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pth");
    std::fs::write(&path, b"definitely not a checkpoint").unwrap();
    let err = CheckpointManager::load(&path).unwrap_err();
    assert!(matches!(err, CheckpointError::Corrupt { .. }));
}

#[test]
fn truncated_payload_is_reported_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let (model, optim) = trained_pair();
    let mgr = CheckpointManager::new(dir.path(), "exp", "vgg_slim");
    let path = mgr
        .save(&model, &optim, 0, 1e-4, IterationLabel::End)
        .unwrap();

    let raw = std::fs::read(&path).unwrap();
    std::fs::write(&path, &raw[..raw.len() / 2]).unwrap();
    let err = CheckpointManager::load(&path).unwrap_err();
    assert!(matches!(err, CheckpointError::Corrupt { .. }));
}
