/// Foreground window identification.
///
/// The label for a saved clip comes from the first [`IdentityStrategy`] that
/// produces a non-empty name after sanitizing:
///   1. the `FileDescription` of the foreground window's executable
///      (e.g. "Rocket League" for `RocketLeague.exe`),
///   2. the foreground window's title text.
///
/// Lookups never fail outward: anything the OS refuses to tell us becomes an
/// empty string. On non-Windows platforms both strategies compile but always
/// report empty.
use std::path::PathBuf;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::sanitize::sanitize_name;

/// One way of naming the window that had focus when a replay was saved.
pub trait IdentityStrategy {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Returns a raw, unsanitized label, or an empty string if unknown.
    fn identify(&self) -> String;
}

/// Ordered chain of strategies, short-circuiting on the first usable label.
pub struct IdentityResolver {
    strategies: Vec<Box<dyn IdentityStrategy + Send>>,
}

impl IdentityResolver {
    pub fn new(strategies: Vec<Box<dyn IdentityStrategy + Send>>) -> Self {
        Self { strategies }
    }

    /// Process description first, window title second.
    pub fn foreground() -> Self {
        Self::new(vec![
            Box::new(ProcessDescription),
            Box::new(WindowTitle),
        ])
    }

    /// Returns the sanitized label of the first strategy that yields one,
    /// or an empty string if none do.
    pub fn resolve(&self) -> String {
        for strategy in &self.strategies {
            let label = sanitize_name(&strategy.identify());
            if !label.is_empty() {
                log::debug!("Identified foreground window via {}: {label}", strategy.name());
                return label;
            }
            log::debug!("{} produced no usable label", strategy.name());
        }
        String::new()
    }
}

/// Product name from the version resource of the foreground window's executable.
pub struct ProcessDescription;

impl IdentityStrategy for ProcessDescription {
    fn name(&self) -> &'static str {
        "process description"
    }

    fn identify(&self) -> String {
        let Some(pid) = imp::foreground_pid() else {
            return String::new();
        };
        let Some(exe) = executable_path(pid) else {
            log::debug!("No executable path for pid {pid}");
            return String::new();
        };
        imp::file_description(&exe).unwrap_or_default()
    }
}

/// Title bar text of the foreground window.
pub struct WindowTitle;

impl IdentityStrategy for WindowTitle {
    fn name(&self) -> &'static str {
        "window title"
    }

    fn identify(&self) -> String {
        imp::foreground_title().unwrap_or_default()
    }
}

/// Looks up the executable image of `pid` in the OS process table.
fn executable_path(pid: u32) -> Option<PathBuf> {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
    );
    sys.process(pid)
        .and_then(|p| p.exe())
        .map(|p| p.to_path_buf())
}

// ── Windows implementation ─────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::ffi::{c_void, OsStr, OsString};
    use std::os::windows::ffi::{OsStrExt, OsStringExt};
    use std::path::Path;

    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::{
        GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    };

    fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    /// Process ID owning the foreground window, if there is one.
    pub fn foreground_pid() -> Option<u32> {
        let mut pid = 0u32;
        unsafe {
            let hwnd = GetForegroundWindow();
            GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
        }
        (pid != 0).then_some(pid)
    }

    pub fn foreground_title() -> Option<String> {
        unsafe {
            let hwnd = GetForegroundWindow();
            let length = GetWindowTextLengthW(hwnd);
            if length <= 0 {
                return None;
            }

            let mut buffer: Vec<u16> = vec![0; (length + 1) as usize];
            let copied = GetWindowTextW(hwnd, &mut buffer);
            if copied <= 0 {
                return None;
            }
            buffer.truncate(copied as usize);
            Some(OsString::from_wide(&buffer).to_string_lossy().into_owned())
        }
    }

    /// Reads `\StringFileInfo\<lang><codepage>\FileDescription` from the
    /// version resource of `exe`, using the first listed translation.
    pub fn file_description(exe: &Path) -> Option<String> {
        let path_w = to_wide(exe.as_os_str());
        let path = PCWSTR::from_raw(path_w.as_ptr());

        unsafe {
            let size = GetFileVersionInfoSizeW(path, None);
            if size == 0 {
                return None;
            }
            let mut data = vec![0u8; size as usize];
            GetFileVersionInfoW(path, 0, size, data.as_mut_ptr() as *mut c_void).ok()?;

            let (lang, codepage) = query_translation(&data)?;
            let sub_block = format!("\\StringFileInfo\\{lang:04X}{codepage:04X}\\FileDescription");
            let value = query_value(&data, &sub_block)?;
            let chars = std::slice::from_raw_parts(value.0 as *const u16, value.1 as usize);
            // The reported length includes the terminating NUL.
            let end = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
            Some(OsString::from_wide(&chars[..end]).to_string_lossy().into_owned())
        }
    }

    unsafe fn query_translation(data: &[u8]) -> Option<(u16, u16)> {
        let (ptr, len) = query_value(data, "\\VarFileInfo\\Translation")?;
        if (len as usize) < 4 {
            return None;
        }
        let pair = std::slice::from_raw_parts(ptr as *const u16, 2);
        Some((pair[0], pair[1]))
    }

    unsafe fn query_value(data: &[u8], sub_block: &str) -> Option<(*mut c_void, u32)> {
        let sub_w = to_wide(OsStr::new(sub_block));
        let mut out: *mut c_void = std::ptr::null_mut();
        let mut len = 0u32;
        let ok = VerQueryValueW(
            data.as_ptr() as *const c_void,
            PCWSTR::from_raw(sub_w.as_ptr()),
            &mut out,
            &mut len,
        );
        if !ok.as_bool() || out.is_null() || len == 0 {
            return None;
        }
        Some((out, len))
    }
}

#[cfg(not(windows))]
mod imp {
    use std::path::Path;

    pub fn foreground_pid() -> Option<u32> {
        None
    }

    pub fn foreground_title() -> Option<String> {
        None
    }

    pub fn file_description(_exe: &Path) -> Option<String> {
        None
    }
}
