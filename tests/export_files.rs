use std::collections::BTreeMap;
use std::fs;

use fixed_point_hex::loader::{load_json_tensor, SafetensorsLoader};
use fixed_point_hex::matrices::Matrix;
use fixed_point_hex::{
    export_to_file, ExportConfig, ExportError, ExportPlan, FormatConfig, Preset, Tensor, TensorSource,
};
use safetensors::tensor::TensorView;
use safetensors::Dtype;
use tempfile::tempdir;

/// A 3-layer perceptron laid out like `fc{1,2,3}_weights` / `fc{1,2,3}_biases`.
fn mlp_tensors() -> BTreeMap<String, Tensor> {
    let mut tensors = BTreeMap::new();
    let dims = [(20usize, 10usize), (8, 20), (2, 8)];
    for (i, &(out_dim, in_dim)) in dims.iter().enumerate() {
        let w: Vec<f32> = (0..out_dim * in_dim)
            .map(|k| ((k as f32) * 0.37).sin() * 0.8)
            .collect();
        let b: Vec<f32> = (0..out_dim).map(|k| k as f32 * -0.125).collect();
        let w_name = format!("fc{}_weights", i + 1);
        let b_name = format!("fc{}_biases", i + 1);
        tensors.insert(
            w_name.clone(),
            Tensor::new(w_name, vec![out_dim, in_dim], w).unwrap(),
        );
        tensors.insert(b_name.clone(), Tensor::vector(b_name, b));
    }
    tensors.insert(
        "input".to_string(),
        Tensor::new("input", vec![1, 10], (0..10).map(|k| k as f32 / 10.0).collect()).unwrap(),
    );
    tensors
}

#[test]
fn scalar_file_format() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fc1_biases.hex");
    let bias = Tensor::vector("fc1_biases", vec![1.5, -1.5, 0.0, 127.99609375, -128.0]);

    let summary = export_to_file(&bias, &ExportConfig::default(), &path).unwrap();
    assert_eq!(summary.lines, 5);

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, "0180\nfe80\n0000\n7fff\n8000\n");
}

#[test]
fn packed_file_format() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.hex");
    let input = Tensor::vector("input", vec![1.0 / 256.0, 2.0 / 256.0, 3.0 / 256.0]);

    export_to_file(&input, &ExportConfig::packed(FormatConfig::default(), 16), &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let expected = format!("{}000300020001\n", "0".repeat(52));
    assert_eq!(text, expected);
}

#[test]
fn weight_rows_stay_contiguous() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("w.hex");
    // [[a, b, c], [d, e, f]] in lanes of 3: one word per output unit
    let m = Matrix::from_rows(&[vec![0.5, 1.0, 1.5], vec![-0.5, -1.0, -1.5]]).unwrap();
    let w = Tensor::from_matrix("fc.weight", &m);

    export_to_file(&w, &ExportConfig::packed(FormatConfig::default(), 3), &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, "018001000080\nfe80ff00ff80\n");
}

#[test]
fn exports_are_byte_identical_across_runs() {
    let tensors = mlp_tensors();
    let plan = ExportPlan::from_preset(Preset::Vector, FormatConfig::default(), &tensors.tensor_names());

    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = plan.run(&tensors, first.path()).unwrap();
    let b = plan.run(&tensors, second.path()).unwrap();
    assert_eq!(a.len(), 7);

    for (fa, fb) in a.iter().zip(&b) {
        assert_eq!(fa.summary, fb.summary);
        assert_eq!(fs::read(&fa.path).unwrap(), fs::read(&fb.path).unwrap());
    }

    // Rerunning into the same directory overwrites with the same bytes
    let before = fs::read(&a[0].path).unwrap();
    plan.run(&tensors, first.path()).unwrap();
    assert_eq!(fs::read(&a[0].path).unwrap(), before);
}

#[test]
fn vector_preset_line_counts() {
    let tensors = mlp_tensors();
    let plan = ExportPlan::from_preset(Preset::Vector, FormatConfig::default(), &tensors.tensor_names());
    let dir = tempdir().unwrap();
    let written = plan.run(&tensors, dir.path()).unwrap();

    let lines: BTreeMap<_, _> = written
        .iter()
        .map(|f| (f.tensor.as_str(), f.summary.lines))
        .collect();
    // 200 weights in 16 lanes, 20 biases one per line, 10 inputs in one word
    assert_eq!(lines["fc1_weights"], 13);
    assert_eq!(lines["fc1_biases"], 20);
    assert_eq!(lines["fc2_weights"], 10);
    assert_eq!(lines["fc3_weights"], 1);
    assert_eq!(lines["input"], 1);

    let text = fs::read_to_string(dir.path().join("fc1_weights.hex")).unwrap();
    assert!(text.lines().all(|l| l.len() == 64));
    assert!(text.ends_with('\n') && !text.ends_with("\n\n"));
}

#[test]
fn scalar_preset_matches_single_lane_plan() {
    let tensors = mlp_tensors();
    let names = tensors.tensor_names();
    let scalar = ExportPlan::from_preset(Preset::Scalar, FormatConfig::default(), &names);
    let mut single_lane = scalar.clone();
    for entry in &mut single_lane.entries {
        entry.lane_count = Some(1);
    }

    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let wa = scalar.run(&tensors, a.path()).unwrap();
    let wb = single_lane.run(&tensors, b.path()).unwrap();
    for (fa, fb) in wa.iter().zip(&wb) {
        assert_eq!(fs::read(&fa.path).unwrap(), fs::read(&fb.path).unwrap());
    }
}

#[test]
fn invalid_plan_writes_nothing() {
    let tensors = mlp_tensors();
    let plan = ExportPlan::from_json_str(
        r#"{"format": {"bits": 16, "frac_bits": 8},
            "entries": [{"tensor": "fc1_biases"}, {"tensor": "input", "lane_count": 0}]}"#,
    )
    .unwrap();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    assert!(matches!(plan.run(&tensors, &out), Err(ExportError::Config(_))));
    assert!(!out.exists());
}

#[test]
fn oversized_lane_count_fails_before_output() {
    let tensors = mlp_tensors();
    let plan = ExportPlan::from_json_str(
        r#"{"entries": [{"tensor": "fc1_biases"},
                        {"tensor": "input", "lane_count": 18446744073709551615}]}"#,
    )
    .unwrap();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    assert!(matches!(plan.run(&tensors, &out), Err(ExportError::Config(_))));
    assert!(!out.exists());
}

#[test]
fn unwritable_destination_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("x.hex");
    let t = Tensor::vector("input", vec![0.0]);
    assert!(matches!(
        export_to_file(&t, &ExportConfig::default(), &path),
        Err(ExportError::Io(_))
    ));
}

#[test]
fn safetensors_model_to_hex() {
    let weight: Vec<u8> = [0.5f32, -0.5, 1.0, -1.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let views = vec![("fc1.weight", TensorView::new(Dtype::F32, vec![2, 2], &weight).unwrap())];
    let bytes = safetensors::serialize(views, &None).unwrap();

    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.safetensors");
    fs::write(&model_path, bytes).unwrap();

    let loader = SafetensorsLoader::from_file(&model_path).unwrap();
    let plan = ExportPlan::from_preset(Preset::Scalar, FormatConfig::default(), &loader.tensor_names());
    let written = plan.run(&loader, dir.path()).unwrap();

    assert_eq!(written[0].path, dir.path().join("fc1_weight.hex"));
    let text = fs::read_to_string(&written[0].path).unwrap();
    assert_eq!(text, "0080\nff80\n0100\nff00\n");
}

#[test]
fn json_input_tensor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("input.json");
    fs::write(&path, r#"{"name": "input", "shape": [2, 2], "flat": [0.5, 0.25, -0.25, 0]}"#).unwrap();
    let t = load_json_tensor(&path).unwrap();
    assert_eq!(t.shape, vec![2, 2]);

    fs::write(&path, r#"{"name": "input", "shape": [3], "flat": [0.5]}"#).unwrap();
    assert!(matches!(load_json_tensor(&path), Err(ExportError::Shape { .. })));
}
