//! Registry listing for the `functions` command

use crate::Registry;

/// Render every registered function and method with its parameters.
/// Optional parameters are shown in square brackets.
pub fn functions_listing(registry: &Registry) -> String {
    let mut out = String::from("FUNCTIONS\n\n");
    for function in registry.functions() {
        out.push_str(&format!(
            "  {}({})\n",
            function.name(),
            function.signature().describe()
        ));
    }

    out.push_str("\nMETHODS\n\n");
    for method in registry.methods() {
        out.push_str(&format!(
            "  .{}({})\n",
            method.name(),
            method.signature().describe()
        ));
    }
    out
}
