// ABOUTME: End-to-end tests driving the public API on whole C programs

use minic::{interpret, interpret_file, DiagnosticKind};

/// Run a program and expect a clean exit.
fn run_ok(source: &str) -> (i32, String) {
    let outcome = interpret(source, None);
    assert!(
        outcome.succeeded(),
        "expected success, got {:?}",
        outcome.diagnostics
    );
    (outcome.exit_code, outcome.stdout)
}

/// Run a program and expect exactly one error diagnostic.
fn run_fail(source: &str) -> (i32, String, String) {
    let outcome = interpret(source, None);
    assert!(!outcome.succeeded(), "expected failure, got clean exit");
    let diag = outcome
        .diagnostics
        .iter()
        .find(|d| d.is_error())
        .expect("an error diagnostic");
    (outcome.exit_code, outcome.stdout, diag.to_string())
}

#[test]
fn test_hello_world() {
    let (exit, stdout) = run_ok(r#"int main(){ printf("Hello, %s!\n","world"); return 0; }"#);
    assert_eq!(stdout, "Hello, world!\n");
    assert_eq!(exit, 0);
}

#[test]
fn test_recursive_factorial() {
    let (exit, stdout) = run_ok(
        r#"int fact(int n){ if(n<=1) return 1; return n*fact(n-1);}
           int main(){ printf("%d\n", fact(6)); return 0;}"#,
    );
    assert_eq!(stdout, "720\n");
    assert_eq!(exit, 0);
}

#[test]
fn test_array_fill_and_sum() {
    let (exit, stdout) = run_ok(
        r#"int main(){
               int a[5];
               for(int i=0;i<5;i++) a[i]=i*i;
               int s=0;
               for(int i=0;i<5;i++) s+=a[i];
               printf("%d\n",s);
               return 0;
           }"#,
    );
    assert_eq!(stdout, "30\n");
    assert_eq!(exit, 0);
}

#[test]
fn test_malloc_strcpy_strlen() {
    let (exit, stdout) = run_ok(
        r#"int main(){
               char *p = malloc(12);
               strcpy(p,"abc");
               strcpy(p+3,"def");
               printf("%s len=%d\n", p, strlen(p));
               free(p);
               return 0;
           }"#,
    );
    assert_eq!(stdout, "abcdef len=6\n");
    assert_eq!(exit, 0);
}

#[test]
fn test_division_by_zero_diagnostic() {
    let (exit, stdout, message) =
        run_fail(r#"int main(){ int x=1; int y=0; printf("%d\n", x/y); return 0; }"#);
    assert_eq!(stdout, "");
    assert_ne!(exit, 0);
    assert!(message.contains("RuntimeError"));
    assert!(message.contains("DivisionByZero"));
    assert!(message.contains("line 1"));
}

#[test]
fn test_index_out_of_bounds_diagnostic() {
    let (exit, _, message) = run_fail("int main(){ int a[3]={1,2,3}; return a[3];}");
    assert_ne!(exit, 0);
    assert!(message.contains("IndexOutOfBounds"));
}

#[test]
fn test_exit_code_from_main() {
    let outcome = interpret("int main() { return 7; }", None);
    assert_eq!(outcome.exit_code, 7);
    assert!(outcome.succeeded());
}

#[test]
fn test_string_round_trip_property() {
    let (exit, stdout) = run_ok(
        r#"int main(){
               char buf[32];
               strcpy(buf, "round trip");
               printf("%d\n", strcmp(buf, "round trip"));
               return 0;
           }"#,
    );
    assert_eq!(stdout, "0\n");
    assert_eq!(exit, 0);
}

#[test]
fn test_realloc_preserves_contents() {
    let (_, stdout) = run_ok(
        r#"int main(){
               char *p = malloc(4);
               strcpy(p, "abc");
               char *q = realloc(p, 16);
               strcpy(q + 3, "def");
               printf("%s\n", q);
               free(q);
               return 0;
           }"#,
    );
    assert_eq!(stdout, "abcdef\n");
}

#[test]
fn test_free_null_is_not_an_error() {
    let (exit, _) = run_ok("int main(){ char *p = 0; free(p); return 0; }");
    assert_eq!(exit, 0);
}

#[test]
fn test_operator_precedence_in_full_programs() {
    let (_, stdout) = run_ok(
        r#"int main(){
               printf("%d ", 2 + 3 * 4);
               printf("%d ", (2 + 3) * 4);
               printf("%d ", 1 << 2 | 1);
               printf("%d ", 10 - 4 - 3);
               printf("%d\n", 7 & 3 == 3);
               return 0;
           }"#,
    );
    // 7 & (3 == 3): equality binds tighter than bitwise and.
    assert_eq!(stdout, "14 20 5 3 1\n");
}

#[test]
fn test_do_while_and_ternary() {
    let (_, stdout) = run_ok(
        r#"int main(){
               int n = 3;
               int total = 0;
               do { total += n > 2 ? n : 1; n--; } while (n);
               printf("%d\n", total);
               return 0;
           }"#,
    );
    assert_eq!(stdout, "5\n");
}

#[test]
fn test_two_dimensional_matrix_multiply_entry() {
    let (_, stdout) = run_ok(
        r#"int main(){
               int a[2][2] = {{1, 2}, {3, 4}};
               int b[2][2] = {{5, 6}, {7, 8}};
               int c = 0;
               for (int k = 0; k < 2; k++) c += a[1][k] * b[k][0];
               printf("%d\n", c);
               return 0;
           }"#,
    );
    assert_eq!(stdout, "43\n");
}

#[test]
fn test_getchar_consumes_stdin_text() {
    let outcome = interpret(
        r#"int main(){
               int c;
               while ((c = getchar()) != -1) putchar(c + 1);
               return 0;
           }"#,
        Some("abc"),
    );
    assert!(outcome.succeeded());
    assert_eq!(outcome.stdout, "bcd");
}

#[test]
fn test_atoi_and_abs() {
    let (_, stdout) = run_ok(
        r#"int main(){
               printf("%d %d\n", atoi("  -42x"), abs(-7));
               return 0;
           }"#,
    );
    assert_eq!(stdout, "-42 7\n");
}

#[test]
fn test_global_initialisation_order() {
    let (_, stdout) = run_ok(
        r#"int base = 10;
           int doubled = 0;
           int main(){
               doubled = base * 2;
               printf("%d %d\n", base, doubled);
               return 0;
           }"#,
    );
    assert_eq!(stdout, "10 20\n");
}

#[test]
fn test_parse_error_aborts_without_output() {
    let outcome = interpret("int main( { return 0; }", None);
    assert!(!outcome.succeeded());
    assert_eq!(outcome.stdout, "");
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ParseError);
    assert_ne!(outcome.exit_code, 0);
}

#[test]
fn test_lex_error_carries_position() {
    let outcome = interpret("int main() {\n  int x = $3;\n}", None);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::LexError);
    assert_eq!(outcome.diagnostics[0].line, 2);
}

#[test]
fn test_stale_pointer_read_is_segfault() {
    let (_, _, message) = run_fail(
        r#"int main(){
               char *p = malloc(4);
               free(p);
               return *p;
           }"#,
    );
    assert!(message.contains("SegFault"));
}

#[test]
fn test_double_free_diagnostic() {
    let (_, _, message) = run_fail(
        r#"int main(){
               char *p = malloc(4);
               free(p);
               free(p);
               return 0;
           }"#,
    );
    assert!(message.contains("DoubleFree"));
}

#[test]
fn test_interior_free_diagnostic() {
    let (_, _, message) = run_fail(
        r#"int main(){
               char *p = malloc(8);
               free(p + 1);
               return 0;
           }"#,
    );
    assert!(message.contains("InvalidFree"));
}

#[test]
fn test_interpret_file_round_trip() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "int main() {{ printf(\"from file\"); return 5; }}").unwrap();
    let outcome = interpret_file(file.path()).expect("readable file");
    assert_eq!(outcome.stdout, "from file");
    assert_eq!(outcome.exit_code, 5);
}

#[test]
fn test_interpret_file_missing_path_is_io_error() {
    assert!(interpret_file(std::path::Path::new("/no/such/file.c")).is_err());
}

#[test]
fn test_output_before_failure_is_preserved() {
    let outcome = interpret(
        r#"int main(){
               printf("before\n");
               int zero = 0;
               printf("%d", 1 / zero);
               return 0;
           }"#,
        None,
    );
    assert!(!outcome.succeeded());
    assert_eq!(outcome.stdout, "before\n");
}
