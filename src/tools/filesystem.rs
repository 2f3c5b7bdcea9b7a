//! 沙箱文件系统能力
//!
//! SafeFs 绑定 root_dir，所有路径经 resolve 校验必须在 root 下（禁止 ../ 逃逸）；
//! FileTool 基于 SafeFs 提供 read / write / delete / rename / exists / list。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 词法解析相对路径（目标文件可以尚不存在）；绝对路径与越过根的 .. 均拒绝
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err("Missing path".to_string());
        }
        let mut rel = PathBuf::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => rel.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !rel.pop() {
                        return Err(format!("Path escapes sandbox: {trimmed}"));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("Path escapes sandbox: {trimmed}"));
                }
            }
        }
        let full = self.root_dir.join(rel);
        // 已存在的路径再按真实路径校验一次，挡住指向根外的符号链接
        if let Ok(canonical) = full.canonicalize() {
            if !canonical.starts_with(&self.root_dir) {
                return Err(format!("Path escapes sandbox: {trimmed}"));
            }
        }
        Ok(full)
    }

    pub fn read_file(&self, path: &str) -> Result<String, String> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved).map_err(|e| format!("Read failed: {e}"))
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<usize, String> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("Create dir failed: {e}"))?;
        }
        std::fs::write(&resolved, content).map_err(|e| format!("Write failed: {e}"))?;
        Ok(content.len())
    }

    pub fn delete(&self, path: &str) -> Result<(), String> {
        let resolved = self.resolve(path)?;
        if resolved == self.root_dir {
            return Err("Refusing to delete sandbox root".to_string());
        }
        if resolved.is_dir() {
            std::fs::remove_dir(&resolved)
        } else {
            std::fs::remove_file(&resolved)
        }
        .map_err(|e| format!("Delete failed: {e}"))
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), String> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        std::fs::rename(&src, &dst).map_err(|e| format!("Rename failed: {e}"))
    }

    pub fn exists(&self, path: &str) -> Result<bool, String> {
        Ok(self.resolve(path)?.exists())
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>, String> {
        let base = if path.trim().is_empty() || path.trim() == "." {
            self.root_dir.clone()
        } else {
            self.resolve(path)?
        };
        let mut entries = Vec::new();
        for e in std::fs::read_dir(&base).map_err(|e| format!("List failed: {e}"))? {
            let e = e.map_err(|e| e.to_string())?;
            let name = e.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                let suffix = if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    "/"
                } else {
                    ""
                };
                entries.push(format!("{name}{suffix}"));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// 文件能力
pub struct FileTool {
    fs: SafeFs,
}

impl FileTool {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root_dir),
        }
    }
}

#[async_trait]
impl Capability for FileTool {
    fn name(&self) -> &str {
        "file_agent"
    }

    fn description(&self) -> &str {
        "File system operations inside the workspace: read, write, delete, rename, exists, list. Args: {\"query\": \"...\", \"operation\": \"read|write|delete|rename|exists|list\", \"path\": \"relative path\", \"content\": \"for write\", \"new_path\": \"for rename\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let operation = args.str_arg("operation").unwrap_or("read").to_lowercase();
        let path = args.str_arg("path").unwrap_or("");
        tracing::info!(operation = %operation, path = %path, "file tool execute");

        match operation.as_str() {
            "read" => self.fs.read_file(path),
            "write" => {
                let content = args
                    .extra
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let n = self.fs.write_file(path, content)?;
                Ok(format!("Wrote {n} bytes to {path}"))
            }
            "delete" => self.fs.delete(path).map(|_| format!("Deleted {path}")),
            "rename" => {
                let to = args
                    .str_arg("new_path")
                    .ok_or_else(|| "Missing new_path".to_string())?;
                self.fs.rename(path, to).map(|_| format!("Renamed {path} -> {to}"))
            }
            "exists" => self.fs.exists(path).map(|b| b.to_string()),
            "list" | "ls" => Ok(self.fs.list_dir(path)?.join("\n")),
            other => Err(format!("Unknown operation: {other}")),
        }
    }
}
