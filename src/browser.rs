//! Detection of system Chromium-family browsers.
//!
//! The session drives a real installed browser rather than a bundled
//! build, both for fingerprint consistency and so the user's existing
//! Google profile can be reused for authentication.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Supported browser families (all Chromium-based, CDP-automatable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserType {
    /// Google Chrome.
    Chrome,
    /// Chromium open source browser.
    Chromium,
    /// Brave browser.
    Brave,
    /// Microsoft Edge.
    Edge,
}

impl std::fmt::Display for BrowserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BrowserType::Chrome => "chrome",
            BrowserType::Chromium => "chromium",
            BrowserType::Brave => "brave",
            BrowserType::Edge => "edge",
        };
        write!(f, "{name}")
    }
}

/// A detected browser installation.
#[derive(Debug, Clone)]
pub struct BrowserInstallation {
    /// Browser family.
    pub browser_type: BrowserType,
    /// Executable path.
    pub executable_path: PathBuf,
}

impl BrowserInstallation {
    /// Whether the executable still exists.
    pub fn is_valid(&self) -> bool {
        self.executable_path.exists()
    }
}

/// Detects installed browsers with platform-specific paths.
pub struct BrowserDetector;

impl BrowserDetector {
    /// Detect all installed Chromium-family browsers, preferred first
    /// (Chrome, then Chromium, Brave, Edge).
    pub fn detect_all() -> Vec<BrowserInstallation> {
        let mut found = Vec::new();
        for (browser_type, candidates) in Self::candidate_paths() {
            for path in candidates {
                if path.exists() {
                    found.push(BrowserInstallation {
                        browser_type,
                        executable_path: path,
                    });
                    break;
                }
            }
        }
        found
    }

    /// Pick the preferred installed browser, or fail with an explicit
    /// error naming what is supported.
    pub fn preferred() -> Result<BrowserInstallation> {
        Self::detect_all().into_iter().next().ok_or_else(|| {
            Error::Browser(
                "no supported browser found; install Chrome, Chromium, Brave, or Edge".into(),
            )
        })
    }

    /// Classify a user-supplied executable path by its name.
    pub fn classify(path: &std::path::Path) -> BrowserType {
        let name = path.to_string_lossy().to_lowercase();
        if name.contains("brave") {
            BrowserType::Brave
        } else if name.contains("chromium") {
            BrowserType::Chromium
        } else if name.contains("edge") {
            BrowserType::Edge
        } else {
            BrowserType::Chrome
        }
    }

    #[cfg(target_os = "linux")]
    fn candidate_paths() -> Vec<(BrowserType, Vec<PathBuf>)> {
        let p = PathBuf::from;
        vec![
            (
                BrowserType::Chrome,
                vec![
                    p("/usr/bin/google-chrome"),
                    p("/usr/bin/google-chrome-stable"),
                    p("/opt/google/chrome/chrome"),
                ],
            ),
            (
                BrowserType::Chromium,
                vec![
                    p("/usr/bin/chromium"),
                    p("/usr/bin/chromium-browser"),
                    p("/snap/bin/chromium"),
                ],
            ),
            (
                BrowserType::Brave,
                vec![
                    p("/usr/bin/brave-browser"),
                    p("/usr/bin/brave"),
                    p("/opt/brave.com/brave/brave-browser"),
                ],
            ),
            (
                BrowserType::Edge,
                vec![p("/usr/bin/microsoft-edge"), p("/opt/microsoft/msedge/msedge")],
            ),
        ]
    }

    #[cfg(target_os = "macos")]
    fn candidate_paths() -> Vec<(BrowserType, Vec<PathBuf>)> {
        let p = PathBuf::from;
        vec![
            (
                BrowserType::Chrome,
                vec![p("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")],
            ),
            (
                BrowserType::Chromium,
                vec![p("/Applications/Chromium.app/Contents/MacOS/Chromium")],
            ),
            (
                BrowserType::Brave,
                vec![p("/Applications/Brave Browser.app/Contents/MacOS/Brave Browser")],
            ),
            (
                BrowserType::Edge,
                vec![p("/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge")],
            ),
        ]
    }

    #[cfg(target_os = "windows")]
    fn candidate_paths() -> Vec<(BrowserType, Vec<PathBuf>)> {
        let p = PathBuf::from;
        vec![
            (
                BrowserType::Chrome,
                vec![
                    p(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
                    p(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
                ],
            ),
            (
                BrowserType::Chromium,
                vec![p(r"C:\Program Files\Chromium\Application\chrome.exe")],
            ),
            (
                BrowserType::Brave,
                vec![p(r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe")],
            ),
            (
                BrowserType::Edge,
                vec![p(r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe")],
            ),
        ]
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    fn candidate_paths() -> Vec<(BrowserType, Vec<PathBuf>)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_executable_name() {
        assert_eq!(
            BrowserDetector::classify(std::path::Path::new("/usr/bin/brave-browser")),
            BrowserType::Brave
        );
        assert_eq!(
            BrowserDetector::classify(std::path::Path::new("/usr/bin/chromium")),
            BrowserType::Chromium
        );
        assert_eq!(
            BrowserDetector::classify(std::path::Path::new("/opt/custom/browser")),
            BrowserType::Chrome
        );
    }

    #[test]
    fn detection_never_reports_missing_executables() {
        for installation in BrowserDetector::detect_all() {
            assert!(installation.is_valid());
        }
    }
}
