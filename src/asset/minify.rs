//! Minification for the built-in `minify` stage.
//!
//! Uses oxc for JavaScript, lightningcss for CSS and serde_json for JSON.
//! Anything else passes through untouched.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

/// Minify JavaScript source code.
pub fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// Re-serialize JSON without whitespace.
pub fn minify_json(source: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(source).ok()?;
    serde_json::to_string(&value).ok()
}

/// Whether `ext` has a minifier.
pub fn supports(ext: &str) -> bool {
    matches!(ext, "js" | "mjs" | "cjs" | "css" | "json")
}

/// Minify content based on the artifact extension.
///
/// Returns `Some(minified)` if minification succeeded, `None` otherwise.
pub fn minify_by_ext(ext: &str, content: &str) -> Option<String> {
    match ext {
        "js" | "mjs" | "cjs" => minify_js(content),
        "css" => minify_css(content),
        "json" => minify_json(content),
        _ => None,
    }
}
