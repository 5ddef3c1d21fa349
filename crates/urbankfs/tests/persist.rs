//! Saving and loading replicate collections built from the built-in handles.

use ndarray::array;

use urbankfs::model::{
    Activation, DenseLayer, FittedReplicate, Mlp, ModelConfig, ModelFit, NetworkFit, Node,
    RandomForest, ReplicateCollection, ScaleFactors, TargetTransform, Tree,
};
use urbankfs::persist::{self, PersistError};
use urbankfs::testing::blocky_table;
use urbankfs::{KfsPipeline, PipelineConfig};

fn structure_tree(blocky_value: f64, other_value: f64) -> Tree {
    // feature 3 is the structure code; blocky is category 0
    Tree::from_nodes(vec![
        Node::Categorical {
            feature: 3,
            right_categories: vec![0],
            left: 1,
            right: 2,
            default_left: true,
        },
        Node::Leaf { value: other_value },
        Node::Leaf { value: blocky_value },
    ])
    .unwrap()
}

fn network(sample_id: u32) -> FittedReplicate {
    let hidden = DenseLayer::from_array(array![[0.02, -0.01], [0.0, 0.01], [0.01, 0.0], [0.0, 0.0]]).unwrap();
    let output = DenseLayer::from_array(array![[0.6], [0.4], [0.0]]).unwrap();
    let mlp = Mlp::new(vec![hidden, output], Activation::Tanh).unwrap();
    let fit = NetworkFit::new(std::sync::Arc::new(mlp), ScaleFactors::new(-1.0, 2.0).unwrap())
        .with_target_transform(TargetTransform::Log10);
    FittedReplicate::new(sample_id, ModelConfig::ann(false), ModelFit::Network(fit)).unwrap()
}

fn forest(sample_id: u32) -> FittedReplicate {
    let trees = vec![
        structure_tree(12.0 + sample_id as f64, 1.0),
        structure_tree(13.0, 2.0),
    ];
    let forest = RandomForest::new(trees, 4).unwrap();
    FittedReplicate::new(sample_id, ModelConfig::rf(false, true), ModelFit::forest(forest)).unwrap()
}

fn collection() -> ReplicateCollection {
    ReplicateCollection::from_replicates((1..=3).flat_map(|id| [network(id), forest(id)])).unwrap()
}

#[test]
fn saved_collection_reproduces_the_summary() {
    let original = collection();
    let path = std::env::temp_dir().join(format!("urbankfs-it-{}.json", std::process::id()));
    persist::save_collection_json(&path, &original).unwrap();
    let restored = persist::load_collection_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let pipeline = KfsPipeline::new(PipelineConfig::builder().n_threads(1).build().unwrap());
    let before = pipeline.run(&blocky_table(), &original).unwrap();
    let after = pipeline.run(&blocky_table(), &restored).unwrap();

    assert_eq!(before.predictions, after.predictions);
    assert_eq!(before.summary, after.summary);
    assert_eq!(after.summary.len(), 4);
}

#[test]
fn forest_routes_on_structure_category() {
    let out = KfsPipeline::default()
        .predict(&blocky_table(), &collection().select_labels(&["rf2"]))
        .unwrap();
    // both records are blocky: mean of (12 + id) and 13
    for row in out.predictions.iter() {
        assert_eq!(row.kfs, (12.0 + row.sample_id as f64 + 13.0) / 2.0);
    }
}

#[test]
fn tampered_tree_is_rejected() {
    let json = persist::to_json_string(&collection()).unwrap();
    let tampered = json.replacen("\"right\": 2", "\"right\": 9", 1);
    assert_ne!(json, tampered);
    assert!(matches!(persist::from_json_str(&tampered), Err(PersistError::Json(_))));
}

#[test]
fn empty_network_layer_is_rejected() {
    let json = r#"{"version": 1, "replicates": [{
        "sample_id": 1, "model_type": "ann", "scale_factors": [0.0, 1.0],
        "model": {"type": "mlp", "layers": [{"weights": {"v": 1, "dim": [0, 1], "data": []}}]}
    }]}"#;
    let err = persist::from_json_str(json).unwrap_err();
    assert!(matches!(err, PersistError::Invalid { sample_id: 1, .. }), "{err:?}");
}

#[test]
fn malformed_json_is_reported() {
    assert!(matches!(persist::from_json_str("{"), Err(PersistError::Json(_))));
    let err = persist::from_json_str(r#"{"version": 1, "replicates": [{"sample_id": 1}]}"#).unwrap_err();
    assert!(matches!(err, PersistError::Json(_)));
}
