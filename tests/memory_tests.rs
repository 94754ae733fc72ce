// ABOUTME: Heap, pointer, and array semantics through whole programs

use minic::{interpret, interpret_with, DiagnosticKind, InterpreterOptions};

fn exit_of(source: &str) -> i32 {
    let outcome = interpret(source, None);
    assert!(
        outcome.succeeded(),
        "expected success, got {:?}",
        outcome.diagnostics
    );
    outcome.exit_code
}

fn error_of(source: &str) -> String {
    let outcome = interpret(source, None);
    assert!(!outcome.succeeded(), "expected failure");
    outcome.diagnostics[0].to_string()
}

#[test]
fn test_pointer_walk_over_malloced_buffer() {
    let exit = exit_of(
        r#"int main(){
               int *xs = malloc(4 * sizeof(int));
               for (int i = 0; i < 4; i++) xs[i] = i + 1;
               int s = 0;
               int *p = xs;
               for (int i = 0; i < 4; i++) s += *p++;
               free(xs);
               return s;
           }"#,
    );
    assert_eq!(exit, 10);
}

#[test]
fn test_boundary_last_element_ok_one_past_fails() {
    assert_eq!(exit_of("int main(){ int a[4]; a[3] = 9; return a[3]; }"), 9);
    let message = error_of("int main(){ int a[4]; a[4] = 9; return 0; }");
    assert!(message.contains("IndexOutOfBounds"));
}

#[test]
fn test_malloc_zero_is_consistently_null() {
    let exit = exit_of(
        r#"int main(){
               char *a = malloc(0);
               char *b = malloc(0);
               return (a == 0) + (b == 0);
           }"#,
    );
    assert_eq!(exit, 2);
}

#[test]
fn test_address_of_and_deref_through_pointer() {
    let exit = exit_of(
        r#"int main(){
               int x = 5;
               int *p = &x;
               *p = *p + 2;
               return x;
           }"#,
    );
    assert_eq!(exit, 7);
}

#[test]
fn test_swap_through_pointers() {
    let exit = exit_of(
        r#"void swap(int *a, int *b) { int t = *a; *a = *b; *b = t; }
           int main(){
               int x = 3;
               int y = 4;
               swap(&x, &y);
               return x * 10 + y;
           }"#,
    );
    assert_eq!(exit, 43);
}

#[test]
fn test_heap_limit_is_enforced() {
    let options = InterpreterOptions {
        max_heap_bytes: 1024,
        ..Default::default()
    };
    let outcome = interpret_with(
        "int main(){ char *p = malloc(4096); return 0; }",
        None,
        &options,
        None,
    );
    assert!(!outcome.succeeded());
    assert!(outcome.diagnostics[0].to_string().contains("OutOfMemory"));
}

#[test]
fn test_leak_warning_includes_allocation_site() {
    let options = InterpreterOptions {
        strict_leaks: true,
        ..Default::default()
    };
    let outcome = interpret_with(
        "int main(){\n    char *p = malloc(10);\n    return 0;\n}",
        None,
        &options,
        None,
    );
    assert!(outcome.succeeded());
    let leak = &outcome.diagnostics[0];
    assert_eq!(leak.kind, DiagnosticKind::LeakWarning);
    assert_eq!(leak.line, 2);
    assert!(leak.message.contains("10 bytes"));
}

#[test]
fn test_freed_allocations_do_not_warn() {
    let options = InterpreterOptions {
        strict_leaks: true,
        ..Default::default()
    };
    let outcome = interpret_with(
        "int main(){ char *p = malloc(10); free(p); return 0; }",
        None,
        &options,
        None,
    );
    assert!(outcome.succeeded());
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn test_string_literals_are_read_only() {
    let message = error_of(
        r#"int main(){
               char *p = "immutable";
               p[0] = 'X';
               return 0;
           }"#,
    );
    assert!(message.contains("SegFault"));
}

#[test]
fn test_string_literals_are_interned() {
    let exit = exit_of(
        r#"int main(){
               char *a = "same";
               char *b = "same";
               return a == b;
           }"#,
    );
    assert_eq!(exit, 1);
}

#[test]
fn test_writes_through_stale_frame_storage_fail() {
    let message = error_of(
        r#"int *escape() { int local = 3; return &local; }
           int main(){ int *p = escape(); return *p; }"#,
    );
    assert!(message.contains("SegFault"));
}

#[test]
fn test_null_pointer_dereference() {
    let message = error_of("int main(){ int *p = 0; return p[0]; }");
    assert!(message.contains("NullDereference"));
}

#[test]
fn test_sizeof_drives_allocation_correctly() {
    let exit = exit_of(
        r#"int main(){
               int n = 6;
               int *xs = malloc(n * sizeof(int));
               for (int i = 0; i < n; i++) xs[i] = 1;
               int s = 0;
               for (int i = 0; i < n; i++) s += xs[i];
               free(xs);
               return s;
           }"#,
    );
    assert_eq!(exit, 6);
}

#[test]
fn test_char_buffer_byte_layout() {
    let exit = exit_of(
        r#"int main(){
               char buf[4];
               buf[0] = 'a';
               buf[1] = 'b';
               buf[2] = 0;
               return strlen(buf);
           }"#,
    );
    assert_eq!(exit, 2);
}

#[test]
fn test_realloc_of_stale_pointer_fails() {
    let message = error_of(
        r#"int main(){
               char *p = malloc(4);
               free(p);
               char *q = realloc(p, 8);
               return 0;
           }"#,
    );
    assert!(message.contains("DoubleFree"));
}
