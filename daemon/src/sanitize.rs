/// Characters and fragments stripped from window/application names before
/// they are used as a folder or file name component.
const DISALLOWED: [&str; 11] = ["\\", "/", ":", "*", "?", "\"", "<", ">", "|", ".exe", "$"];

/// Removes characters that are illegal in Windows file names, plus the
/// `.exe` suffix and `$`, then trims surrounding whitespace.
///
/// Removal repeats until nothing disallowed is left, so inputs such as
/// `".e$xe"` (which only form `.exe` once `$` is gone) come out clean and
/// sanitizing twice gives the same result as sanitizing once.
pub fn sanitize_name(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let mut next = current.clone();
        for fragment in DISALLOWED {
            if next.contains(fragment) {
                next = next.replace(fragment, "");
            }
        }
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}
