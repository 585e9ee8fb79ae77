//! End-to-end conversion tests: analyzer program in, resolved graph out.
//!
//! Programs are built with [`ProgramBuilder`] so each test states exactly
//! the declarations it depends on.

use std::collections::HashSet;

use docgraph_core::analyzer::{
    NodeIndex, NodeKind, ParameterData, ProgramBuilder, ProgramData, SignatureData, TypeExpr,
};
use docgraph_core::converter::{ConversionResult, Converter};
use docgraph_core::models::{
    CommentPart, LinkTarget, ProjectReflection, Reflection, ReflectionId, ReflectionKind, ROOT_ID,
};
use docgraph_core::options::ConverterOptions;
use docgraph_core::output::{LINK_EXCLUDED, LINK_NOT_FOUND};
use docgraph_core::router::Router;
use docgraph_core::serialization::{from_json_str, to_json_string};
use docgraph_core::symbol_id::InMemoryPackages;

// ============================================================================
// Helpers
// ============================================================================

fn convert_with(program: &ProgramData, options: ConverterOptions) -> ConversionResult {
    Converter::new(options)
        .with_package_locator(Box::new(InMemoryPackages::new().with_package("demo", "src")))
        .convert(program)
        .expect("conversion succeeds")
}

fn convert(program: &ProgramData) -> ConversionResult {
    convert_with(program, ConverterOptions::default())
}

fn find(project: &ProjectReflection, path: &str) -> ReflectionId {
    project
        .find_reflection_by_name(ROOT_ID, path)
        .unwrap_or_else(|| panic!("no reflection named {}", path))
}

fn get<'p>(project: &'p ProjectReflection, id: ReflectionId) -> &'p Reflection {
    project.get(id).expect("reflection exists")
}

fn first_signature(project: &ProjectReflection, id: ReflectionId) -> ReflectionId {
    get(project, id).as_declaration().unwrap().signatures[0]
}

fn first_parameter(project: &ProjectReflection, signature: ReflectionId) -> ReflectionId {
    get(project, signature).as_signature().unwrap().parameters[0]
}

fn summary(project: &ProjectReflection, id: ReflectionId) -> String {
    get(project, id)
        .comment
        .as_ref()
        .map(|c| c.summary())
        .unwrap_or_default()
}

fn signature(params: &[(&str, &str)], comment: Option<&str>) -> SignatureData {
    SignatureData {
        parameters: params
            .iter()
            .map(|(name, ty)| ParameterData {
                name: name.to_string(),
                type_: Some(TypeExpr::intrinsic(*ty)),
                ..ParameterData::default()
            })
            .collect(),
        return_type: Some(TypeExpr::intrinsic("number")),
        comment: comment.map(str::to_string),
        ..SignatureData::default()
    }
}

/// `interface Shape { area(scale) }` and `class Circle implements Shape`.
///
/// The interface signature documents `scale`; the class method's own
/// comment is `class_comment`.
fn shapes_program(class_comment: &str) -> (ProgramData, NodeIndex) {
    let mut b = ProgramBuilder::new();
    let file = b.file("src/shapes.ts", true);

    let shape = b.add(file, None, NodeKind::Interface, "Shape");
    b.node_mut(shape).flags.exported = true;
    let shape_area = b.add(file, Some(shape), NodeKind::Method, "area");
    b.node_mut(shape_area).signatures = vec![signature(
        &[("scale", "number")],
        Some("/**\n * Computes the area.\n * @param scale The factor\n */"),
    )];

    let circle = b.add(file, None, NodeKind::Class, "Circle");
    b.node_mut(circle).flags.exported = true;
    let shape_ref = b.reference_to(shape);
    b.node_mut(circle).implements = vec![shape_ref];
    let circle_area = b.add(file, Some(circle), NodeKind::Method, "area");
    b.node_mut(circle_area).comment = Some(class_comment.to_string());
    b.node_mut(circle_area).signatures = vec![signature(&[("s", "number")], None)];

    (b.build(), circle)
}

/// Script file with `A`, `B extends A`, `C extends B`.
fn hierarchy_program() -> ProgramData {
    let mut b = ProgramBuilder::new();
    let file = b.file("src/hierarchy.ts", false);

    let a = b.add(file, None, NodeKind::Class, "A");
    b.add(file, Some(a), NodeKind::Property, "x");
    let secret = b.add(file, Some(a), NodeKind::Property, "secret");
    b.node_mut(secret).flags.private = true;
    let a_greet = b.add(file, Some(a), NodeKind::Method, "greet");
    b.node_mut(a_greet).signatures = vec![signature(&[], None)];

    let bn = b.add(file, None, NodeKind::Class, "B");
    let a_ref = b.reference_to(a);
    b.node_mut(bn).extends = vec![a_ref];
    let b_greet = b.add(file, Some(bn), NodeKind::Method, "greet");
    b.node_mut(b_greet).signatures = vec![signature(&[], None)];

    let c = b.add(file, None, NodeKind::Class, "C");
    let b_ref = b.reference_to(bn);
    b.node_mut(c).extends = vec![b_ref];

    b.build()
}

// ============================================================================
// Implements
// ============================================================================

mod implements_tests {
    use super::*;

    #[test]
    fn circle_member_implements_shape_member() {
        let (program, _) = shapes_program("/** @inheritDoc */");
        let result = convert(&program);
        let p = &result.project;

        let shape = find(p, "src/shapes.Shape");
        let shape_area = find(p, "src/shapes.Shape.area");
        let circle = find(p, "src/shapes.Circle");
        let circle_area = find(p, "src/shapes.Circle.area");

        let implementation = get(p, circle_area)
            .as_declaration()
            .unwrap()
            .implementation_of
            .clone()
            .expect("implementation_of set");
        assert_eq!(implementation.name, "Shape.area");
        assert_eq!(implementation.reflection(), Some(shape_area));

        let circle_sig = first_signature(p, circle_area);
        let sig_impl = get(p, circle_sig)
            .as_signature()
            .unwrap()
            .implementation_of
            .clone()
            .expect("signature implementation_of set");
        assert_eq!(sig_impl.reflection(), Some(first_signature(p, shape_area)));

        // implementation_of implies the interface is among implemented types
        let implemented: Vec<_> = get(p, circle)
            .as_declaration()
            .unwrap()
            .implemented_types
            .iter()
            .filter_map(|t| t.as_reference())
            .filter_map(|r| r.reflection())
            .collect();
        assert_eq!(implemented, vec![shape]);

        let implemented_by = &get(p, shape).as_declaration().unwrap().implemented_by;
        assert_eq!(implemented_by.len(), 1);
        assert_eq!(implemented_by[0].reflection(), Some(circle));
    }

    #[test]
    fn inherit_doc_copies_comment_and_parameter_comments_by_position() {
        let (program, _) = shapes_program("/** @inheritDoc */");
        let result = convert(&program);
        let p = &result.project;

        let circle_sig = first_signature(p, find(p, "src/shapes.Circle.area"));
        assert_eq!(summary(p, circle_sig), "Computes the area.");
        let comment = get(p, circle_sig).comment.as_ref().unwrap();
        assert!(!comment.has_modifier("@inheritDoc"));

        let s = first_parameter(p, circle_sig);
        assert_eq!(get(p, s).name, "s");
        assert_eq!(summary(p, s), "The factor");

        let scale = first_parameter(p, first_signature(p, find(p, "src/shapes.Shape.area")));
        assert_eq!(summary(p, scale), "The factor");
    }

    #[test]
    fn own_comment_is_kept_without_inherit_doc() {
        let (program, _) = shapes_program("/** Circle area. */");
        let result = convert(&program);
        let p = &result.project;

        let circle_sig = first_signature(p, find(p, "src/shapes.Circle.area"));
        assert_eq!(summary(p, circle_sig), "Circle area.");
        assert!(get(p, first_parameter(p, circle_sig)).comment.is_none());
        assert!(get(p, circle_sig)
            .as_signature()
            .unwrap()
            .implementation_of
            .is_some());
    }

    #[test]
    fn signatures_with_different_parameter_types_do_not_match() {
        let (mut program, circle) = shapes_program("/** @inheritDoc */");
        let circle_area = program.nodes[circle.0].children[0];
        program.nodes[circle_area.0].signatures = vec![signature(&[("s", "string")], None)];
        let result = convert(&program);
        let p = &result.project;

        let circle_area = find(p, "src/shapes.Circle.area");
        assert!(get(p, circle_area)
            .as_declaration()
            .unwrap()
            .implementation_of
            .is_some());
        let circle_sig = first_signature(p, circle_area);
        assert!(get(p, circle_sig)
            .as_signature()
            .unwrap()
            .implementation_of
            .is_none());
        assert!(get(p, circle_sig)
            .comment
            .as_ref()
            .unwrap()
            .has_modifier("@inheritDoc"));
    }
}

// ============================================================================
// Inheritance and hierarchy
// ============================================================================

mod hierarchy_tests {
    use super::*;

    fn level_names(p: &ProjectReflection, id: ReflectionId) -> Vec<(Vec<String>, bool)> {
        get(p, id)
            .as_declaration()
            .unwrap()
            .type_hierarchy
            .as_ref()
            .expect("hierarchy built")
            .levels
            .iter()
            .map(|l| (l.types.iter().map(|t| t.name.clone()).collect(), l.is_target))
            .collect()
    }

    #[test]
    fn chain_hierarchy_lists_ancestors_target_and_subtypes() {
        let result = convert(&hierarchy_program());
        let p = &result.project;
        let (a, b, c) = (find(p, "A"), find(p, "B"), find(p, "C"));

        assert_eq!(
            level_names(p, c),
            vec![
                (vec!["A".to_string()], false),
                (vec!["B".to_string()], false),
                (vec!["C".to_string()], true),
            ]
        );
        assert_eq!(
            level_names(p, a),
            vec![
                (vec!["A".to_string()], true),
                (vec!["B".to_string()], false),
            ]
        );

        let extended_by = &get(p, b).as_declaration().unwrap().extended_by;
        assert_eq!(extended_by.len(), 1);
        assert_eq!(extended_by[0].reflection(), Some(c));
    }

    #[test]
    fn inherited_members_point_at_nearest_base() {
        let result = convert(&hierarchy_program());
        let p = &result.project;

        let c_x = get(p, find(p, "C.x")).as_declaration().unwrap();
        let inherited = c_x.inherited_from.as_ref().unwrap();
        assert_eq!(inherited.name, "A.x");
        assert_eq!(inherited.reflection(), Some(find(p, "A.x")));

        let c_greet = get(p, find(p, "C.greet")).as_declaration().unwrap();
        assert_eq!(c_greet.inherited_from.as_ref().unwrap().name, "B.greet");
    }

    #[test]
    fn own_member_marks_overwrites_including_signatures() {
        let result = convert(&hierarchy_program());
        let p = &result.project;

        let b_greet = find(p, "B.greet");
        let declaration = get(p, b_greet).as_declaration().unwrap();
        assert_eq!(declaration.overwrites.as_ref().unwrap().name, "A.greet");
        assert!(declaration.inherited_from.is_none());
        let sig = get(p, declaration.signatures[0]).as_signature().unwrap();
        assert_eq!(sig.overwrites.as_ref().unwrap().name, "A.greet");
    }

    #[test]
    fn private_members_are_not_inherited() {
        let result = convert(&hierarchy_program());
        let p = &result.project;
        assert!(p.child_by_name(find(p, "A"), "secret").is_some());
        assert!(p.child_by_name(find(p, "B"), "secret").is_none());
        assert!(p.child_by_name(find(p, "C"), "secret").is_none());
    }

    #[test]
    fn inherited_members_are_not_in_symbol_mapping() {
        let result = convert(&hierarchy_program());
        let p = &result.project;
        let c_x = find(p, "C.x");
        assert!(p.symbol_mapping().values().all(|id| *id != c_x));
        assert!(p.symbol_mapping().values().any(|id| *id == find(p, "A.x")));
    }
}

// ============================================================================
// Declarations
// ============================================================================

mod declaration_tests {
    use super::*;

    #[test]
    fn merged_declarations_take_highest_precedence_kind() {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/merge.ts", false);
        let first = b.add(file, None, NodeKind::Namespace, "Merged");
        let symbol = b.symbol_of(first).unwrap();
        b.add_with_symbol(file, None, NodeKind::Class, "Merged", symbol);
        b.add_with_symbol(file, None, NodeKind::Enum, "Merged", symbol);
        let result = convert(&b.build());
        let p = &result.project;

        assert_eq!(p.root().children().len(), 1);
        assert_eq!(get(p, find(p, "Merged")).kind, ReflectionKind::Class);
    }

    #[test]
    fn module_then_interface_keeps_module() {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/merge.ts", false);
        let first = b.add(file, None, NodeKind::Module, "Both");
        let symbol = b.symbol_of(first).unwrap();
        b.add_with_symbol(file, None, NodeKind::Interface, "Both", symbol);
        let result = convert(&b.build());
        // unlisted kinds rank below Module
        assert_eq!(get(&result.project, find(&result.project, "Both")).kind, ReflectionKind::Module);
    }

    #[test]
    fn first_declaration_owns_the_symbol_key() {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/merge.ts", false);
        let first = b.add(file, None, NodeKind::Interface, "Opts");
        let symbol = b.symbol_of(first).unwrap();
        b.add_with_symbol(file, None, NodeKind::Interface, "Opts", symbol);
        let result = convert(&b.build());
        let p = &result.project;

        let opts = find(p, "Opts");
        assert_eq!(p.symbol_mapping().len(), 1);
        assert_eq!(p.symbol_mapping().values().next(), Some(&opts));
        assert_eq!(get(p, opts).as_declaration().unwrap().sources.len(), 2);
    }

    #[test]
    fn excluded_not_exported_keeps_exported_scope_members() {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/api.ts", true);
        let public = b.add(file, None, NodeKind::Class, "Public");
        b.node_mut(public).flags.exported = true;
        b.add(file, Some(public), NodeKind::Property, "field");
        b.add(file, None, NodeKind::Class, "Internal");
        let options = ConverterOptions {
            exclude_not_exported: true,
            ..ConverterOptions::default()
        };
        let result = convert_with(&b.build(), options);
        let p = &result.project;

        let field = find(p, "src/api.Public.field");
        assert!(get(p, field).flags.exported);
        assert!(p.find_reflection_by_name(ROOT_ID, "src/api.Internal").is_none());
    }

    #[test]
    fn sources_are_relative_to_base_dir() {
        let mut b = ProgramBuilder::new();
        let file = b.file("/work/demo/src/a.ts", false);
        b.add(file, None, NodeKind::Variable, "answer");
        let options = ConverterOptions {
            base_dir: Some("/work/demo".into()),
            ..ConverterOptions::default()
        };
        let result = convert_with(&b.build(), options);
        let p = &result.project;

        let sources = &get(p, find(p, "answer")).as_declaration().unwrap().sources;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].file_name, "src/a.ts");
        assert_eq!(sources[0].line, 1);
    }
}

// ============================================================================
// @module
// ============================================================================

mod module_tag_tests {
    use super::*;

    #[test]
    fn module_tag_merges_into_existing_sibling() {
        let mut b = ProgramBuilder::new();
        let a = b.file("src/a.ts", true);
        b.add(a, None, NodeKind::Function, "fromA");
        let extra = b.file("src/extra.ts", true);
        b.file_mut(extra).comment = Some("/** @module src/a */".to_string());
        b.add(extra, None, NodeKind::Function, "fromExtra");
        let result = convert(&b.build());
        let p = &result.project;

        assert_eq!(p.root().children().len(), 1);
        let module = find(p, "src/a");
        assert!(p.child_by_name(module, "fromA").is_some());
        assert!(p.child_by_name(module, "fromExtra").is_some());
    }

    #[test]
    fn module_tag_renames_when_no_sibling_matches() {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/util/strings.ts", true);
        b.file_mut(file).comment = Some("/**\n * String helpers.\n * @module strings\n */".to_string());
        b.add(file, None, NodeKind::Function, "pad");
        let result = convert(&b.build());
        let p = &result.project;

        let module = find(p, "strings");
        assert_eq!(summary(p, module), "String helpers.");
        assert!(p.child_by_name(module, "pad").is_some());
    }
}

// ============================================================================
// Links
// ============================================================================

mod link_tests {
    use super::*;

    fn linked_program(comment: &str) -> ProgramData {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/widgets.ts", false);
        let widget = b.add(file, None, NodeKind::Class, "Widget");
        b.node_mut(widget).comment = Some(comment.to_string());
        let helper = b.add(file, None, NodeKind::Function, "helper");
        b.node_mut(helper).signatures = vec![signature(&[], None)];
        let hidden = b.add(file, None, NodeKind::Class, "Hidden");
        b.node_mut(hidden).flags.private = true;
        b.build()
    }

    fn inline_tags(p: &ProjectReflection, id: ReflectionId) -> Vec<(String, Option<LinkTarget>)> {
        get(p, id)
            .comment
            .as_ref()
            .unwrap()
            .short_text
            .iter()
            .filter_map(|part| match part {
                CommentPart::InlineTag { text, target, .. } => Some((text.clone(), target.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn broken_link_gives_one_warning_and_stays_unlinked() {
        let program = linked_program("/** See {@link Missing} and {@link helper}. */");
        let result = convert(&program);
        let p = &result.project;
        let widget = find(p, "Widget");

        assert_eq!(result.warnings.len(), 1);
        let warning = &result.warnings[0];
        assert_eq!(warning.code, LINK_NOT_FOUND);
        assert_eq!(warning.reflection.as_deref(), Some("Widget"));
        assert_eq!(warning.text.as_deref(), Some("Missing"));

        let tags = inline_tags(p, widget);
        assert_eq!(tags[0], ("Missing".to_string(), None));
        assert_eq!(
            tags[1],
            ("helper".to_string(), Some(LinkTarget::Reflection(find(p, "helper"))))
        );
    }

    #[test]
    fn excluded_target_is_reported_with_override_suggestion() {
        let program = linked_program("/** Uses [[Hidden]]. */");
        let options = ConverterOptions {
            exclude_private: true,
            ..ConverterOptions::default()
        };
        let result = convert_with(&program, options);

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, LINK_EXCLUDED);
        assert!(result.warnings[0]
            .suggestion
            .as_deref()
            .unwrap()
            .contains("external_links"));
    }

    #[test]
    fn documented_target_out_of_scope_is_not_found() {
        let mut b = ProgramBuilder::new();
        let shapes = b.file("src/shapes.ts", true);
        let circle = b.add(shapes, None, NodeKind::Class, "Circle");
        b.node_mut(circle).flags.exported = true;
        let widgets = b.file("src/widgets.ts", true);
        let widget = b.add(widgets, None, NodeKind::Class, "Widget");
        b.node_mut(widget).flags.exported = true;
        b.node_mut(widget).comment = Some("/** Draws a {@link Circle}. */".to_string());
        let result = convert(&b.build());

        assert!(result.project.find_reflection_by_name(ROOT_ID, "src/shapes.Circle").is_some());
        assert_eq!(result.warnings.len(), 1);
        let warning = &result.warnings[0];
        assert_eq!(warning.code, LINK_NOT_FOUND);
        assert_eq!(warning.text.as_deref(), Some("Circle"));
        assert_eq!(warning.suggestion.as_deref(), Some("use \"src/shapes!Circle\""));
    }

    #[test]
    fn module_qualified_text_suggests_bang_form() {
        let program = linked_program("/** See {@link lib/io.Reader}. */");
        let result = convert(&program);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].suggestion.as_deref(),
            Some("use \"lib/io!Reader\"")
        );
    }

    #[test]
    fn external_links_resolve_and_suppress_warnings() {
        let program = linked_program("/** Returns a {@link Promise}. */");
        let mut options = ConverterOptions::default();
        options
            .external_links
            .insert("Promise".to_string(), "https://example.org/Promise".to_string());
        let result = convert_with(&program, options);
        let p = &result.project;

        assert!(result.warnings.is_empty());
        assert_eq!(
            inline_tags(p, find(p, "Widget"))[0].1,
            Some(LinkTarget::Url("https://example.org/Promise".to_string()))
        );
    }

    #[test]
    fn validation_switch_silences_warnings() {
        let program = linked_program("/** See {@link Missing}. */");
        let mut options = ConverterOptions::default();
        options.validation.invalid_link = false;
        let result = convert_with(&program, options);
        assert!(result.warnings.is_empty());
    }
}

// ============================================================================
// Router and serialization over converted projects
// ============================================================================

mod output_tests {
    use super::*;

    #[test]
    fn page_urls_are_unique_and_stable() {
        let (program, _) = shapes_program("/** @inheritDoc */");
        let result = convert(&program);
        let p = &result.project;

        let mut router = Router::from_options(&ConverterOptions::default());
        let pages = router.build_pages(p);
        let unique: HashSet<&str> = pages.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(unique.len(), pages.len());
        assert_eq!(router.build_pages(p), pages);

        let circle_area = get(p, find(p, "src/shapes.Circle.area"));
        assert_eq!(
            router.full_url(circle_area).unwrap(),
            "classes/src_shapes.Circle.html#area"
        );
    }

    #[test]
    fn converted_project_survives_serialization() {
        let result = convert(&hierarchy_program());
        let json = to_json_string(&result.project).unwrap();
        let back = from_json_str(&json).unwrap();

        assert_eq!(back.ids(), result.project.ids());
        assert_eq!(back.symbol_mapping().len(), result.project.symbol_mapping().len());
        assert_eq!(to_json_string(&back).unwrap(), json);
    }
}
