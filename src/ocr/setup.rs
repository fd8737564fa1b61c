use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

/// Install locations checked when tesseract is not on PATH.
const COMMON_EXECUTABLE_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

/// System tessdata directories, checked after the local one.
const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Ensures Tesseract and the traineddata for `language` are available.
///
/// The executable must already be installed. Missing traineddata is
/// downloaded into the local tessdata directory.
pub fn ensure_tesseract(language: &str) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;

    let tessdata = match find_tessdata_dir(language) {
        Ok(dir) => dir,
        Err(_) => {
            let local_tessdata = get_tesseract_dir().join("tessdata");
            log(&format!(
                "Traineddata for '{}' not found, downloading to {}",
                language,
                local_tessdata.display()
            ));
            fs::create_dir_all(&local_tessdata).with_context(|| {
                format!("Failed to create {}", local_tessdata.display())
            })?;

            for name in traineddata_names(language) {
                if !local_tessdata.join(&name).exists() {
                    download_traineddata(&local_tessdata, &name)?;
                }
            }
            local_tessdata
        }
    };

    log(&format!(
        "Tesseract ready: {} (tessdata: {})",
        executable.display(),
        tessdata.display()
    ));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Returns the traineddata file names a language tag needs.
/// "eng+fra" needs both eng.traineddata and fra.traineddata.
pub fn traineddata_names(language: &str) -> Vec<String> {
    language
        .split('+')
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(|lang| format!("{}.traineddata", lang))
        .collect()
}

/// True when `dir` holds every traineddata file `language` needs.
pub fn has_traineddata(dir: &Path, language: &str) -> bool {
    let names = traineddata_names(language);
    !names.is_empty() && names.iter().all(|name| dir.join(name).exists())
}

/// Downloads one traineddata file from the tessdata repository.
fn download_traineddata(tessdata_dir: &Path, file_name: &str) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, file_name);
    let target = tessdata_dir.join(file_name);

    log(&format!("Downloading {}...", url));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "statblock-importer")
        .send()
        .with_context(|| format!("Failed to request {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            file_name,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    file.write_all(&bytes)?;

    log(&format!("Downloaded {} ({} bytes)", file_name, bytes.len()));

    Ok(())
}

/// Finds the Tesseract executable: local tool dir, then PATH, then common
/// install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_EXECUTABLE_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR and add it to PATH, \
         or copy the executable to: {}",
        get_tesseract_dir().display()
    ))
}

/// Finds a tessdata directory containing the traineddata for `language`.
pub fn find_tessdata_dir(language: &str) -> Result<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    candidates.extend(SYSTEM_TESSDATA_PATHS.iter().map(PathBuf::from));

    candidates
        .into_iter()
        .find(|dir| has_traineddata(dir, language))
        .ok_or_else(|| anyhow!("tessdata for '{}' not found", language))
}
