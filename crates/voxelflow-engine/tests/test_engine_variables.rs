//! End-to-end tests: a two-device construction pass populating both
//! collectors, followed by checkpoint restoration from an on-disk store.

use approx::assert_relative_eq;
use tempfile::TempDir;
use voxelflow_core::{EngineError, Initializer, Shape, Tensor, VariableStore};
use voxelflow_engine::{
    Bucket, CollectionView, DirCheckpointStore, GradientSet, GradientsCollector,
    OutputsCollector, RestoreOrchestrator, RestoreRegistry, SummaryKind,
};

fn vec_tensor(values: &[f32]) -> Tensor<f32> {
    Tensor::from_vec(&[values.len()], values.to_vec()).unwrap()
}

#[test]
fn test_two_device_construction_pass() {
    let n_devices = 2;
    let mut graph = VariableStore::<f32>::new();
    let w = graph
        .add_variable("net/conv/w", Shape::from_slice(&[2]), Initializer::Zeros)
        .unwrap();

    let mut gradients = GradientsCollector::new(n_devices).unwrap();
    let mut outputs = OutputsCollector::new(n_devices).unwrap();

    // construction runs once per device, in device order
    for device in 0..n_devices {
        let scale = (device + 1) as f32;
        let mut set = GradientSet::new();
        set.push(vec_tensor(&[scale, 2.0 * scale]), w.clone());
        gradients.add_to_collection(set).unwrap();

        outputs
            .add_to_console(Tensor::from_scalar(scale), "loss", true)
            .unwrap();
        outputs
            .add_to_summary(Tensor::from_scalar(scale), "loss", true, SummaryKind::Scalar)
            .unwrap();
        outputs
            .add_to_network_output(vec_tensor(&[scale, scale]), "segmentation", false)
            .unwrap();
    }

    // gradients: elementwise mean over the two devices
    let averaged = gradients.gradients().unwrap();
    assert_eq!(averaged.len(), 1);
    assert_relative_eq!(averaged.pairs()[0].gradient.get(&[0]).unwrap(), 1.5);
    assert_relative_eq!(averaged.pairs()[0].gradient.get(&[1]).unwrap(), 3.0);

    outputs.finalise().unwrap();

    // console "loss" collapsed to the device mean under the original key
    let console = outputs.console_variables();
    assert_relative_eq!(
        console["loss"].as_single().unwrap().scalar_value().unwrap(),
        1.5
    );

    // the non-averaged output entries were renamed per device
    let output = outputs.output_variables();
    assert!(output.contains_key("segmentation"));
    assert!(output.contains_key("segmentation_1"));

    // the merged summary carries the averaged scalar
    match outputs.variables(Bucket::Summary) {
        CollectionView::MergedSummary(Some(merged)) => {
            assert_eq!(merged.tags(), vec!["loss_device_average_"]);
        }
        other => panic!("unexpected summary view: {:?}", other),
    }
}

#[test]
fn test_restore_from_disk_with_scope_precedence() {
    let dir = TempDir::new().unwrap();
    let checkpoints = DirCheckpointStore::new(dir.path()).unwrap();

    // a full pretrained model and a sharper fine-tuned head, both storing the
    // conv weights under their own namespaces
    checkpoints
        .save_checkpoint(
            "pretrained",
            &[
                ("backbone/conv/w", &vec_tensor(&[1.0, 1.0])),
                ("backbone/conv/b", &vec_tensor(&[0.5])),
            ],
        )
        .unwrap();
    checkpoints
        .save_checkpoint("finetuned", &[("seg/conv/w", &vec_tensor(&[9.0, 9.0]))])
        .unwrap();

    let mut graph = VariableStore::<f32>::new();
    let conv_w = graph
        .add_variable("seg/conv/w", Shape::from_slice(&[2]), Initializer::Zeros)
        .unwrap();
    let conv_b = graph
        .add_variable("seg/conv/b", Shape::from_slice(&[1]), Initializer::Zeros)
        .unwrap();
    let head_w = graph
        .add_variable("seg/head/w", Shape::from_slice(&[3]), Initializer::Ones)
        .unwrap();

    let mut registry = RestoreRegistry::new();
    // the more specific scope registers first, but "seg" sorts first and wins
    registry.register("seg/conv", "finetuned", "seg/conv");
    registry.register("seg", "pretrained", "backbone");

    let orchestrator =
        RestoreOrchestrator::new(&graph, &registry, &checkpoints, &checkpoints);
    let op = orchestrator.build(None).unwrap();

    assert_eq!(op.restored_count(), 2);
    assert_eq!(op.fresh_count(), 1);
    assert_eq!(
        op.restore_source(&conv_w),
        Some(("pretrained", "backbone/conv/w"))
    );
    assert_eq!(
        op.restore_source(&conv_b),
        Some(("pretrained", "backbone/conv/b"))
    );
    assert!(!op.is_restored(&head_w));

    op.run().unwrap();
    assert_relative_eq!(conv_w.value().unwrap().get(&[0]).unwrap(), 1.0);
    assert_relative_eq!(conv_b.value().unwrap().get(&[0]).unwrap(), 0.5);
    // the head had no checkpoint match anywhere and used its own initializer
    assert_relative_eq!(head_w.value().unwrap().get(&[2]).unwrap(), 1.0);
}

#[test]
fn test_restore_falls_through_scopes_that_cannot_claim() {
    let dir = TempDir::new().unwrap();
    let checkpoints = DirCheckpointStore::new(dir.path()).unwrap();

    checkpoints
        .save_checkpoint("body", &[("net/conv/w", &vec_tensor(&[2.0]))])
        .unwrap();
    checkpoints
        .save_checkpoint("head", &[("net/head/w", &vec_tensor(&[7.0]))])
        .unwrap();

    let mut graph = VariableStore::<f32>::new();
    let conv_w = graph
        .add_variable("net/conv/w", Shape::from_slice(&[1]), Initializer::Zeros)
        .unwrap();
    let head_w = graph
        .add_variable("net/head/w", Shape::from_slice(&[1]), Initializer::Zeros)
        .unwrap();

    let mut registry = RestoreRegistry::new();
    registry.register("net", "body", "net");
    registry.register("net/head", "head", "net/head");

    let orchestrator =
        RestoreOrchestrator::new(&graph, &registry, &checkpoints, &checkpoints);
    let op = orchestrator.build(None).unwrap();

    // "net" claims only what "body" stores; the head entry still restores the
    // head weights from its own checkpoint
    assert_eq!(op.restore_source(&conv_w), Some(("body", "net/conv/w")));
    assert_eq!(op.restore_source(&head_w), Some(("head", "net/head/w")));

    op.run().unwrap();
    assert_relative_eq!(conv_w.value().unwrap().get(&[0]).unwrap(), 2.0);
    assert_relative_eq!(head_w.value().unwrap().get(&[0]).unwrap(), 7.0);
}

#[test]
fn test_missing_checkpoint_is_fatal() {
    let dir = TempDir::new().unwrap();
    let checkpoints = DirCheckpointStore::new(dir.path()).unwrap();

    let mut graph = VariableStore::<f32>::new();
    graph
        .add_variable("net/w", Shape::from_slice(&[1]), Initializer::Zeros)
        .unwrap();

    let mut registry = RestoreRegistry::new();
    registry.register("net", "never_written", "net");

    let orchestrator =
        RestoreOrchestrator::new(&graph, &registry, &checkpoints, &checkpoints);
    let err = orchestrator.build(None).unwrap_err();
    assert!(matches!(err, EngineError::CheckpointNotFound { .. }));
}

#[test]
fn test_unknown_summary_kind_string_adds_nothing() {
    let outputs = OutputsCollector::<f32>::new(1).unwrap();
    // kind strings from configuration are validated before touching buckets
    let err = "bogus".parse::<SummaryKind>().unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedOption { .. }));
    assert!(outputs.console_variables().is_empty());
    assert!(outputs.output_variables().is_empty());
    assert!(matches!(
        outputs.variables(Bucket::Summary),
        CollectionView::MergedSummary(None)
    ));
}
