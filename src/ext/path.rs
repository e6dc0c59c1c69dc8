use std::path::Path;

use crate::error::{Error, Result};

/// Path helpers used when turning files into named fragments.
pub trait PathExt {
    /// Converts a path to a string slice, failing on invalid Unicode.
    ///
    /// # Examples
    /// ```
    /// use tinplate::ext::PathExt;
    /// use std::path::Path;
    ///
    /// let path = Path::new("layouts/base.html");
    /// assert_eq!(path.to_str_checked().unwrap(), "layouts/base.html");
    /// ```
    fn to_str_checked(&self) -> Result<&str>;

    /// Name of the fragment stored at this path below `root`: the relative
    /// path without its final extension, components joined with `/`.
    ///
    /// # Examples
    /// ```
    /// use tinplate::ext::PathExt;
    /// use std::path::Path;
    ///
    /// let path = Path::new("views/partials/user/card.html");
    /// assert_eq!(path.fragment_name(Path::new("views/partials")).unwrap(), "user/card");
    /// ```
    fn fragment_name(&self, root: &Path) -> Result<String>;
}

impl PathExt for Path {
    fn to_str_checked(&self) -> Result<&str> {
        self.to_str().ok_or_else(|| {
            Error::Other(anyhow::anyhow!(
                "Path '{}' contains invalid Unicode characters",
                self.display()
            ))
        })
    }

    fn fragment_name(&self, root: &Path) -> Result<String> {
        let relative = self.strip_prefix(root).map_err(|_| {
            Error::Other(anyhow::anyhow!(
                "Path '{}' is not inside '{}'",
                self.display(),
                root.display()
            ))
        })?;
        let stemmed = relative.with_extension("");
        let parts = stemmed
            .components()
            .map(|component| Path::new(component.as_os_str()).to_str_checked())
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("/"))
    }
}
