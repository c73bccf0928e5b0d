//! End-to-end conversion tests
//!
//! Each test builds a small tree of declaration files in a temporary directory and checks the rendered document.

use plconf::diagnostics::Issue;
use plconf::require::RequireError;
use plconf::value::Value;
use plconf::{ConvertError, Converter, NamespaceMode, OutputFormat, Settings};
use pretty_assertions::assert_eq;
use std::path::Path;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PLCONF_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

fn write(root: &Path, path: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn render(root: &Path, settings: Settings) -> String {
    let conversion = Converter::new(settings).load(root).expect("conversion");
    OutputFormat::Yaml.render(&conversion.tree).unwrap()
}

#[test]
fn widgets() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "require.pl", "require 'Widgets/base.pl';\n1;\n");
    write(
        dir.path(),
        "Widgets/base.pl",
        "$base = 100; $rate = 2; $total = $base * $rate;\n",
    );

    insta::assert_snapshot!(render(dir.path(), Settings::default()), @r###"
    Widgets:
      base: 100
      rate: 2
      total: 200
    "###);
}

#[test]
fn products() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "require.pl",
        "use strict;\n\
         require 'common/defaults.pl';\n\
         require 'Widgets/widgets.pl';\n\
         require 'Gadgets/gadgets.pl';\n\
         require 'Gadgets/broken.pl';\n",
    );
    write(dir.path(), "common/defaults.pl", "our $version = '1.2';\n");

    let widgets = r#"# Widgets
$price = 250;
$tax = 0.5;
$gross = $price * (1 + $tax);
@sizes = (
    'S', 'M',  # small ones
    'L',
);
%limits = (min => 1, max => $price);
$label = "製品A";
"#;
    let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(widgets);
    write(dir.path(), "Widgets/widgets.pl", encoded);

    write(
        dir.path(),
        "Gadgets/gadgets.pl",
        r#"
$count = 3;
$total = $count * $unit;
$unit = 5;
$half = $count / 2;
$power = 2 ** 10;
$name = $product_name;
$evil = 1 + system('ls');
"#,
    );
    write(dir.path(), "Gadgets/broken.pl", [0xFFu8, 0xFE, 0x81, 0x20]);

    let conversion = Converter::new(Settings::default())
        .load(dir.path())
        .expect("conversion");

    insta::assert_snapshot!(OutputFormat::Yaml.render(&conversion.tree).unwrap(), @r###"
    common:
      version: '1.2'
    Widgets:
      price: 250
      tax: 0.5
      gross: 375.0
      sizes:
      - S
      - M
      - L
      limits:
        min: 1
        max: 250
      label: 製品A
    Gadgets:
      count: 3
      total: $count * $unit
      unit: 5
      half: 1.5
      power: 1024
      name: $product_name
      evil: 1 + system('ls')
    "###);

    assert_eq!(conversion.files_processed, 4);
    assert_eq!(conversion.files_failed, 1);

    let kinds: Vec<&str> = conversion
        .diagnostics
        .issues()
        .iter()
        .map(|issue| match issue {
            Issue::DecodeFailure { .. } => "decode",
            Issue::ForwardReference { .. } => "forward",
            Issue::UnresolvedExpression { .. } => "expression",
            Issue::UnresolvedField { .. } => "field",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["expression", "forward", "expression", "decode", "field", "field", "field"]
    );
}

#[test]
fn assignment_order_matters() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "require.pl", "require 'P/a.pl';\nrequire 'P/b.pl';\n");
    write(dir.path(), "P/a.pl", "$b = $a + 1;\n");
    write(dir.path(), "P/b.pl", "$a = 1;\n$c = $a + 1;\n");

    let conversion = Converter::new(Settings::default())
        .load(dir.path())
        .unwrap();

    assert_eq!(conversion.tree.get("P", "b"), Some(&Value::from("$a + 1")));
    assert_eq!(conversion.tree.get("P", "c"), Some(&Value::Integer(2)));
}

#[test]
fn cyclic_requires_abort() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "require.pl", "require 'a.pl';\n");
    write(dir.path(), "a.pl", "require 'b.pl';\n");
    write(dir.path(), "b.pl", "require 'a.pl';\n");

    let err = Converter::new(Settings::default())
        .load(dir.path())
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Require(RequireError::Cycle { .. })
    ));
}

#[test]
fn missing_aggregator_aborts() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "P/a.pl", "$a = 1;\n");

    let err = Converter::new(Settings::default())
        .load(dir.path())
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Require(RequireError::NoRequiresFound { .. })
    ));
}

#[test]
fn flat_root_without_requires() {
    init_tracing();
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("Flat");
    write(&root, "a.pl", "$a = 1;\n");
    write(&root, "b.pl", "@list = ($a, 2);\n");

    let settings = Settings {
        follow_requires: false,
        ..Settings::default()
    };

    insta::assert_snapshot!(render(&root, settings), @r###"
    Flat:
      a: 1
      list:
      - 1
      - 2
    "###);
}

#[test]
fn namespaces_from_markers() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "require.pl", "require 'all.pl';\n");
    write(
        dir.path(),
        "all.pl",
        "# Product: Alpha\n$x = 1;\n$y = $x * 3;\n# Product: Beta\n$x = 2;\n$y = $x * 3;\n",
    );

    let settings = Settings {
        namespace_mode: NamespaceMode::Marker,
        ..Settings::default()
    };

    insta::assert_snapshot!(render(dir.path(), settings), @r###"
    Alpha:
      x: 1
      y: 3
    Beta:
      x: 2
      y: 6
    "###);
}

#[test]
fn convert_writes_documents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out/nested");
    write(&input, "require.pl", "require 'P/a.pl';\n");
    write(&input, "P/a.pl", "$a = 7;\n$b = $missing;\n");

    let settings = Settings {
        output_format: OutputFormat::Json,
        ..Settings::default()
    };
    let report = Converter::new(settings).convert(&input, &output).unwrap();

    assert_eq!(report.config_path, output.join("config.json"));
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.variables, 2);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.warnings, 2);

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.config_path).unwrap()).unwrap();
    assert_eq!(
        config,
        serde_json::json!({"P": {"a": 7, "b": "$missing"}})
    );

    let diagnostics: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report.diagnostics_path).unwrap())
            .unwrap();
    assert_eq!(diagnostics[0]["kind"], "forward_reference");
    assert_eq!(diagnostics[1]["kind"], "unresolved_field");
}
