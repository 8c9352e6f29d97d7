// Integration tests for the preprocessor and its interaction with the parser

use omgidl::parser::ast::*;
use omgidl::preprocessor::{preprocess, preprocess_with_loader, PreprocessorError};
use omgidl::{parse_with_loader, Error, MemoryLoader, ParseOptions};

fn run(source: &str, loader: &MemoryLoader) -> Result<String, PreprocessorError> {
    preprocess_with_loader(source, Some("main.idl"), &ParseOptions::new(), loader)
}

fn significant_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

#[test]
fn test_ifdef_else_elides_branch() {
    let out = preprocess("#ifdef X\nA x;\n#else\nB x;\n#endif\n", None).unwrap();
    assert_eq!(significant_lines(&out), vec!["B x;"]);
    assert!(!out.contains('A'));
}

#[test]
fn test_ifdef_taken_when_defined() {
    let options = ParseOptions::new().with_define("X", None);
    let out = preprocess_with_loader(
        "#ifdef X\nA x;\n#else\nB x;\n#endif\n",
        None,
        &options,
        &MemoryLoader::new(),
    )
    .unwrap();
    assert_eq!(significant_lines(&out), vec!["A x;"]);
}

#[test]
fn test_if_elif_chain() {
    let source = "#define LEVEL 2\n\
                  #if LEVEL == 1\none\n\
                  #elif LEVEL == 2 && (1 || 1 / 0)\ntwo\n\
                  #else\nother\n\
                  #endif\n";
    let out = run(source, &MemoryLoader::new()).unwrap();
    assert_eq!(significant_lines(&out), vec!["two"]);
}

#[test]
fn test_function_like_macro() {
    let source = "#define PAIR(t, a, b) t a; t b;\nPAIR(long, x, y)\n";
    let out = run(source, &MemoryLoader::new()).unwrap();
    assert_eq!(significant_lines(&out), vec!["long x; long y;"]);
}

#[test]
fn test_include_and_line_markers() {
    let loader = MemoryLoader::new().with_file("base.idl", "interface Base {};\n");
    let out = run("#include \"base.idl\"\ninterface Derived : Base {};\n", &loader).unwrap();

    let base = out.find("# 1 \"base.idl\"").expect("marker for included file");
    let back = out.find("# 2 \"main.idl\"").expect("marker back in main file");
    assert!(base < back);
}

#[test]
fn test_missing_include() {
    let err = run("\n#include \"nope.idl\"\n", &MemoryLoader::new()).unwrap_err();
    assert_eq!(err, PreprocessorError::new("Couldn't find 'nope.idl'", 2));
}

#[test]
fn test_recursive_include() {
    let loader = MemoryLoader::new()
        .with_file("a.idl", "#include \"b.idl\"\n")
        .with_file("b.idl", "#include \"a.idl\"\n");
    let err = run("#include \"a.idl\"\n", &loader).unwrap_err();
    assert_eq!(err.message, "Recursive inclusion of 'a.idl'");
}

#[test]
fn test_trigraphs_and_continuations() {
    let out = run("??=define LONG_NAME \\\n  long\nLONG_NAME x;\n", &MemoryLoader::new()).unwrap();
    assert_eq!(significant_lines(&out), vec!["long x;"]);
}

#[test]
fn test_pragma_passthrough_reaches_parser() {
    let loader = MemoryLoader::new().with_file("prefix.idl", "#pragma prefix \"org.omg\"\n");
    let source = "#include \"prefix.idl\"\nmodule CosNaming { };\n";
    let spec = parse_with_loader(source, Some("main.idl"), &ParseOptions::new(), &loader).unwrap();
    match &spec.definitions[0] {
        Definition::Module(module) => assert_eq!(module.name, "org.omg.CosNaming"),
        other => panic!("Expected module, got {:?}", other),
    }
}

#[test]
fn test_pragma_in_disabled_region_is_dropped() {
    let source = "#if 0\n#pragma prefix \"skip\"\n#endif\nmodule M { };\n";
    let spec = parse_with_loader(source, None, &ParseOptions::new(), &MemoryLoader::new()).unwrap();
    match &spec.definitions[0] {
        Definition::Module(module) => assert_eq!(module.name, "M"),
        other => panic!("Expected module, got {:?}", other),
    }
}

#[test]
fn test_preprocessor_error_surfaces_through_parse() {
    let err = parse_with_loader("#endif\n", None, &ParseOptions::new(), &MemoryLoader::new()).unwrap_err();
    assert!(matches!(err, Error::Preprocessor(_)));
    assert_eq!(err.to_string(), "Misplaced #endif at line 1");
}

#[test]
fn test_unevaluable_expression() {
    let err = run("#if 1 / 0\n#endif\n", &MemoryLoader::new()).unwrap_err();
    assert!(err.message.starts_with("Couldn't evaluate expression"));
    assert_eq!(err.line, 1);
}

#[test]
fn test_unterminated_include_is_malformed() {
    let loader = MemoryLoader::new().with_file("a", "long x;\n");
    for source in ["#include \"\u{e9}\n", "#include \"a\n", "#include \"ab\n"] {
        let err = run(source, &loader).unwrap_err();
        assert_eq!(err.message, "Malformed #include", "{:?}", source);
        assert_eq!(err.line, 1);
    }
}

#[test]
fn test_unterminated_line_file_is_malformed() {
    let err = run("#line 5 \"\u{e9}\nlong x;\n", &MemoryLoader::new()).unwrap_err();
    assert_eq!(err.message, "Malformed #line");
}

#[test]
fn test_oversized_line_number_is_an_error() {
    let err = parse_with_loader(
        "module M { };\n#line 9223372036854775808\nmodule N { };\n",
        None,
        &ParseOptions::new(),
        &MemoryLoader::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Preprocessor(_)));
    assert_eq!(err.to_string(), "Malformed #line at line 2");
}

#[test]
fn test_carriage_return_line_endings() {
    let source = "#define T long\rtypedef T x;\r#ifdef T\rtypedef T y;\r#endif\r";
    let out = run(source, &MemoryLoader::new()).unwrap();
    assert_eq!(significant_lines(&out), vec!["typedef long x;", "typedef long y;"]);

    let spec = parse_with_loader(source, None, &ParseOptions::new(), &MemoryLoader::new()).unwrap();
    assert_eq!(spec.definitions.len(), 2);
    assert!(spec.definitions.iter().all(|d| matches!(d, Definition::TypeDef(_))));

    let err = parse_with_loader("#define T long\r\rtypedef T ;\r", None, &ParseOptions::new(), &MemoryLoader::new())
        .unwrap_err();
    assert_eq!(err.line(), Some(3));
}
