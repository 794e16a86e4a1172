use clap::Parser;
use image::{Rgb, RgbImage};
use snake_dataset::{write_sample, SampleMeta, MAP_CHANNELS};
use std::fs;
use std::path::Path;
use training::{run_train, TrainArgs};

const SIDE: u32 = 16;

/// Lay down `count` tiny samples with plausible geometry: a text region in
/// the middle of the image, a two-row center line through it.
fn write_split(dir: &Path, count: usize) {
    let side = SIDE as usize;
    let plane = side * side;
    for s in 0..count {
        let meta = SampleMeta {
            id: format!("img{s:03}"),
            image: format!("img{s:03}.png"),
            width: SIDE,
            height: SIDE,
        };
        let img = RgbImage::from_fn(SIDE, SIDE, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, (s as u8) * 40])
        });
        let mut maps = vec![0.0f32; MAP_CHANNELS * plane];
        for y in 0..side {
            for x in 0..side {
                let p = y * side + x;
                maps[p] = 1.0;
                let tr = (4..12).contains(&x) && (4..12).contains(&y);
                if tr {
                    maps[plane + p] = 1.0;
                }
                if tr && (7..9).contains(&y) {
                    maps[2 * plane + p] = 1.0;
                    maps[3 * plane + p] = 2.0;
                    maps[4 * plane + p] = 0.6;
                    maps[5 * plane + p] = 0.8;
                }
            }
        }
        write_sample(dir, &meta, &img, &maps).unwrap();
    }
}

fn smoke_args(root: &Path, save: &Path, logs: &Path, extra: &[&str]) -> TrainArgs {
    let mut argv: Vec<String> = [
        "train",
        "--dataset",
        "total-text",
        "--input-size",
        "16",
        "--backbone",
        "vgg-slim",
        "--batch-size",
        "1",
        "--lr",
        "0.001",
        "--max-epoch",
        "2",
        "--display-freq",
        "2",
        "--viz-freq",
        "100",
        "--log-freq",
        "2",
        "--save-freq",
        "2",
        "--save-iter-freq",
        "100",
        "--exp-name",
        "smoke",
        "--seed",
        "7",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for (flag, path) in [("--data-root", root), ("--save-dir", save), ("--log-dir", logs)] {
        argv.push(flag.to_string());
        argv.push(path.to_string_lossy().into_owned());
    }
    argv.extend(extra.iter().map(|s| s.to_string()));
    TrainArgs::parse_from(argv)
}

#[test]
fn two_epoch_run_produces_logs_and_checkpoints() {
    let root = tempfile::tempdir().unwrap();
    let save = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_split(&root.path().join("train"), 4);
    write_split(&root.path().join("val"), 2);

    run_train(smoke_args(root.path(), save.path(), logs.path(), &[])).unwrap();

    let exp_dir = save.path().join("smoke");
    for file in [
        "tr_loss_result.txt",
        "tcl_loss_result.txt",
        "sin_result.txt",
        "cos_result.txt",
        "radii_result.txt",
        "loss_result.txt",
    ] {
        assert!(exp_dir.join(file).exists(), "missing term log {file}");
    }

    // 4 batches per epoch at display-freq 2: training lines at iterations
    // 0 and 2, plus one validation line per epoch.
    let log = fs::read_to_string(exp_dir.join("loss_result.txt")).unwrap();
    let epoch0_train: Vec<&str> = log
        .lines()
        .filter(|l| l.starts_with("0_") && !l.contains("validation"))
        .collect();
    assert_eq!(epoch0_train.len(), 2, "log was:\n{log}");
    assert!(epoch0_train[0].starts_with("0_0_"));
    assert!(epoch0_train[1].starts_with("0_2_"));
    assert_eq!(log.lines().filter(|l| l.contains("validation")).count(), 2);

    // Values render with four decimal places.
    let value = epoch0_train[0].rsplit('_').next().unwrap();
    assert_eq!(value.split('.').nth(1).unwrap().len(), 4);

    // save-freq 2: end checkpoint for epoch 0 only. save-iter-freq 100:
    // one mid-epoch checkpoint at iteration 0 of each epoch.
    assert!(exp_dir.join("textsnake_vgg_slim_0_end.pth").exists());
    assert!(!exp_dir.join("textsnake_vgg_slim_1_end.pth").exists());
    assert!(exp_dir.join("textsnake_vgg_slim_0_0.pth").exists());
    assert!(exp_dir.join("textsnake_vgg_slim_1_0.pth").exists());

    // Scalar events: train pushes at iterations 0 and 2 per epoch, one val
    // push per epoch.
    let run_dir = fs::read_dir(logs.path())
        .unwrap()
        .next()
        .expect("summary run directory")
        .unwrap()
        .path();
    let events = fs::read_to_string(run_dir.join("scalars.jsonl")).unwrap();
    let mut train_events = 0usize;
    let mut val_events = 0usize;
    for line in events.lines() {
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        match event["tag"].as_str().unwrap() {
            "train" => train_events += 1,
            "val" => val_events += 1,
            other => panic!("unexpected tag {other}"),
        }
        assert!(event["scalars"]["loss"].is_number());
    }
    assert_eq!(train_events, 4);
    assert_eq!(val_events, 2);
}

#[test]
fn resuming_from_a_checkpoint_continues_the_run() {
    let root = tempfile::tempdir().unwrap();
    let save = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    write_split(&root.path().join("train"), 2);
    write_split(&root.path().join("val"), 1);

    let first = smoke_args(
        root.path(),
        save.path(),
        logs.path(),
        &["--max-epoch", "1", "--save-freq", "1"],
    );
    run_train(first).unwrap();

    let exp_dir = save.path().join("smoke");
    let ckpt = exp_dir.join("textsnake_vgg_slim_0_end.pth");
    assert!(ckpt.exists());

    let second = smoke_args(
        root.path(),
        save.path(),
        logs.path(),
        &[
            "--start-epoch",
            "1",
            "--save-freq",
            "1",
            "--resume",
            ckpt.to_string_lossy().as_ref(),
        ],
    );
    run_train(second).unwrap();

    assert!(exp_dir.join("textsnake_vgg_slim_1_end.pth").exists());
    let log = fs::read_to_string(exp_dir.join("loss_result.txt")).unwrap();
    assert!(log.lines().any(|l| l.starts_with("1_0_")));
}
