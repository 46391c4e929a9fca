use backprop_nn::math::seeded_rng;
use backprop_nn::train::Metric;
use backprop_nn::{
    ActivationFunction, Dense, Dropout, LossType, Matrix, Model, ModelSpec, TrainConfig,
};

fn trained_model() -> (Model, Matrix) {
    let mut model = Model::with_seed(4, LossType::CrossEntropy, 41);
    model
        .add_layer(Dense::new(6, Some(ActivationFunction::leaky_relu())))
        .unwrap()
        .add_layer(Dropout::new(0.2).unwrap())
        .unwrap()
        .add_layer(Dense::new(1, Some(ActivationFunction::Sigmoid)))
        .unwrap();

    let x = Matrix::rand_with(16, 4, &mut seeded_rng(42));
    let labels: Vec<f64> = x.iter_rows().map(|r| f64::from(u8::from(r[0] > r[1]))).collect();
    let y = Matrix::column_from(&labels);
    let config = TrainConfig {
        batch_size: 4,
        max_epochs: 5,
        metrics: vec![Metric::Accuracy],
        ..TrainConfig::default()
    };
    model.fit(&x, &y, &config).unwrap();
    model.set_training_mode(false);
    (model, x)
}

#[test]
fn save_load_round_trip_predicts_identically() {
    let (mut model, x) = trained_model();
    let blob = model.save().unwrap();

    let mut restored = Model::load(&blob).unwrap();

    assert_eq!(restored.input_dim(), 4);
    assert_eq!(restored.loss(), LossType::CrossEntropy);
    assert_eq!(restored.num_params(), model.num_params());
    assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
}

#[test]
fn json_files_round_trip() {
    let dir = std::env::temp_dir().join(format!("backprop-nn-persist-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let (mut model, x) = trained_model();

    let model_path = dir.join("model.json");
    model.save_json(&model_path).unwrap();
    let mut restored = Model::load_json(&model_path).unwrap();
    assert!(!restored.is_training());
    assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());

    let spec_path = dir.join("spec.json");
    let spec = model.spec("classifier");
    spec.save_json(&spec_path).unwrap();
    let loaded = ModelSpec::load_json(&spec_path).unwrap();
    assert_eq!(loaded, spec);
    assert_eq!(Model::from_spec(&loaded).unwrap().num_params(), model.num_params());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn inference_mode_survives_save_and_load() {
    let mut model = Model::with_seed(3, LossType::Square, 5);
    model
        .add_layer(Dense::new(8, Some(ActivationFunction::Tanh)))
        .unwrap()
        .add_layer(Dropout::new(0.5).unwrap())
        .unwrap()
        .add_layer(Dense::new(1, None))
        .unwrap();
    model.set_training_mode(false);
    let x = Matrix::rand_with(6, 3, &mut seeded_rng(6));

    let mut restored = Model::load(&model.save().unwrap()).unwrap();
    assert!(!restored.is_training());
    let first = restored.predict(&x).unwrap();
    assert_eq!(restored.predict(&x).unwrap(), first);
    assert_eq!(first, model.predict(&x).unwrap());

    model.set_training_mode(true);
    let reloaded = Model::load(&model.save().unwrap()).unwrap();
    assert!(reloaded.is_training());
}

#[test]
fn garbage_blobs_are_errors() {
    assert!(Model::load("not json").is_err());
    assert!(Model::load(r#"{"input_dim": 1}"#).is_err());
}

#[test]
fn config_loads_from_json() {
    let dir = std::env::temp_dir().join(format!("backprop-nn-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("train.json");

    std::fs::write(&path, r#"{"max_epochs": 7, "metrics": ["loss", "r2"], "seed": 3}"#).unwrap();
    let config = TrainConfig::load_json(&path).unwrap();
    assert_eq!(config.max_epochs, 7);
    assert_eq!(config.metrics, vec![Metric::Loss, Metric::R2]);
    assert_eq!(config.seed, Some(3));

    std::fs::write(&path, r#"{"momentum": 1.5}"#).unwrap();
    assert!(TrainConfig::load_json(&path).is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}
