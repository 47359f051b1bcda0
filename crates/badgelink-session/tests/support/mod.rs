//! In-memory collaborator implementations, grounded in the shape of the
//! original firmware's `mock/src/appfs_mock` and `mock/src/esp_mock`
//! (those are unimplemented stubs there; here they actually hold state so
//! the dispatcher and transfer engine can be exercised end to end).
//!
//! Each mock's state lives behind `Rc<RefCell<_>>` so a test can clone a
//! handle, hand one copy to a `Session`, and still inspect what happened
//! through the other after the session has run.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::rc::Rc;

use badgelink_session::{
    AppStore, AppStoreEntryInfo, FileIo, Filesystem, FsDirEntry, FsError, FsStatInfo, Reboot,
    SettingsEntryInfo, SettingsStore, SettingsValueData,
};

struct AppStoreEntry {
    slug: String,
    title: String,
    version: u32,
    data: Vec<u8>,
}

#[derive(Default)]
struct AppStoreState {
    entries: Vec<AppStoreEntry>,
    total_bytes: u32,
}

#[derive(Clone, Default)]
pub struct MockAppStore {
    inner: Rc<RefCell<AppStoreState>>,
}

impl MockAppStore {
    #[must_use]
    pub fn with_total_bytes(total_bytes: u32) -> Self {
        let state = AppStoreState {
            entries: Vec::new(),
            total_bytes,
        };
        Self {
            inner: Rc::new(RefCell::new(state)),
        }
    }
}

impl AppStore for MockAppStore {
    type Error = Infallible;
    type Handle = usize;

    fn exists(&self, slug: &str) -> bool {
        self.inner.borrow().entries.iter().any(|e| e.slug == slug)
    }

    fn open(&mut self, slug: &str) -> Option<Self::Handle> {
        self.inner.borrow().entries.iter().position(|e| e.slug == slug)
    }

    fn delete(&mut self, slug: &str) -> Result<(), Self::Error> {
        self.inner.borrow_mut().entries.retain(|e| e.slug != slug);
        Ok(())
    }

    fn create(
        &mut self,
        slug: &str,
        title: &str,
        version: u32,
        size: u32,
    ) -> Result<Option<Self::Handle>, Self::Error> {
        let mut state = self.inner.borrow_mut();
        state.entries.retain(|e| e.slug != slug);
        state.entries.push(AppStoreEntry {
            slug: slug.to_owned(),
            title: title.to_owned(),
            version,
            data: vec![0u8; size as usize],
        });
        Ok(Some(state.entries.len() - 1))
    }

    fn erase(&mut self, handle: Self::Handle, offset: u32, len: u32) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        let entry = &mut state.entries[handle];
        let end = (offset as usize + len as usize).min(entry.data.len());
        entry.data[offset as usize..end].fill(0);
        Ok(())
    }

    fn write(&mut self, handle: Self::Handle, offset: u32, buf: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.inner.borrow_mut();
        let entry = &mut state.entries[handle];
        entry.data[offset as usize..offset as usize + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn read(&mut self, handle: Self::Handle, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let state = self.inner.borrow();
        let entry = &state.entries[handle];
        let offset = offset as usize;
        if offset >= entry.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(entry.data.len() - offset);
        buf[..n].copy_from_slice(&entry.data[offset..offset + n]);
        Ok(n)
    }

    fn entry_info(&self, handle: Self::Handle) -> Option<AppStoreEntryInfo> {
        self.inner.borrow().entries.get(handle).map(|e| AppStoreEntryInfo {
            slug: e.slug.clone(),
            title: e.title.clone(),
            version: e.version,
            size: e.data.len() as u32,
        })
    }

    fn next_entry(&self, prev: Option<Self::Handle>) -> Option<Self::Handle> {
        let next = prev.map_or(0, |p| p + 1);
        (next < self.inner.borrow().entries.len()).then_some(next)
    }

    fn total_bytes(&self) -> u32 {
        self.inner.borrow().total_bytes
    }

    fn free_bytes(&self) -> u32 {
        let state = self.inner.borrow();
        let used: u32 = state.entries.iter().map(|e| e.data.len() as u32).sum();
        state.total_bytes.saturating_sub(used)
    }

    fn boot_select(&mut self, handle: Self::Handle, _arg: u32) -> bool {
        self.inner.borrow().entries.get(handle).is_some()
    }
}

#[derive(Default)]
struct FsState {
    files: HashMap<String, Rc<RefCell<Vec<u8>>>>,
    dirs: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MockFilesystem {
    inner: Rc<RefCell<FsState>>,
}

pub struct MockFile {
    data: Rc<RefCell<Vec<u8>>>,
}

impl FileIo for MockFile {
    type Error = Infallible;

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let data = self.data.borrow();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u32, buf: &[u8]) -> Result<(), Self::Error> {
        let mut data = self.data.borrow_mut();
        let end = offset as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        Ok(())
    }
}

impl MockFilesystem {
    pub fn put(&self, path: &str, data: Vec<u8>) {
        self.inner
            .borrow_mut()
            .files
            .insert(path.to_owned(), Rc::new(RefCell::new(data)));
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.borrow().files.get(path).map(|data| data.borrow().clone())
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.inner.borrow().files.contains_key(path)
    }
}

impl Filesystem for MockFilesystem {
    type Error = Infallible;
    type File = MockFile;
    type DirIter = std::vec::IntoIter<FsDirEntry>;

    fn list_dir(&mut self, path: &str) -> Result<Self::DirIter, FsError<Self::Error>> {
        let state = self.inner.borrow();
        if !state.dirs.contains(path) && path != "/" {
            return Err(FsError::NotFound);
        }
        let prefix = if path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{path}/")
        };
        let mut entries: Vec<FsDirEntry> = state
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(|name| FsDirEntry {
                name: name.to_owned(),
                is_dir: false,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries.into_iter())
    }

    fn stat(&mut self, path: &str) -> Result<FsStatInfo, FsError<Self::Error>> {
        let state = self.inner.borrow();
        if let Some(data) = state.files.get(path) {
            Ok(FsStatInfo {
                size: data.borrow().len() as u32,
                mtime: 0,
                ctime: 0,
                atime: 0,
                is_dir: false,
            })
        } else if state.dirs.contains(path) {
            Ok(FsStatInfo {
                size: 0,
                mtime: 0,
                ctime: 0,
                atime: 0,
                is_dir: true,
            })
        } else {
            Err(FsError::NotFound)
        }
    }

    fn mkdir(&mut self, path: &str) -> Result<(), FsError<Self::Error>> {
        let mut state = self.inner.borrow_mut();
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(FsError::Exists);
        }
        state.dirs.insert(path.to_owned());
        Ok(())
    }

    fn rmdir(&mut self, path: &str) -> Result<(), FsError<Self::Error>> {
        let mut state = self.inner.borrow_mut();
        if state.files.contains_key(path) {
            return Err(FsError::IsFile);
        }
        if !state.dirs.contains(path) {
            return Err(FsError::NotFound);
        }
        let prefix = format!("{path}/");
        if state.files.keys().any(|k| k.starts_with(&prefix)) {
            return Err(FsError::NotEmpty);
        }
        state.dirs.remove(path);
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError<Self::Error>> {
        if self.inner.borrow_mut().files.remove(path).is_some() {
            Ok(())
        } else {
            Err(FsError::NotFound)
        }
    }

    fn create(&mut self, path: &str) -> Result<Self::File, FsError<Self::Error>> {
        let data = Rc::new(RefCell::new(Vec::new()));
        self.inner.borrow_mut().files.insert(path.to_owned(), data.clone());
        Ok(MockFile { data })
    }

    fn open(&mut self, path: &str) -> Result<Self::File, FsError<Self::Error>> {
        let data = self
            .inner
            .borrow()
            .files
            .get(path)
            .cloned()
            .ok_or(FsError::NotFound)?;
        Ok(MockFile { data })
    }
}

#[derive(Default)]
struct SettingsState {
    entries: HashMap<(String, String), SettingsValueData>,
}

#[derive(Clone, Default)]
pub struct MockSettingsStore {
    inner: Rc<RefCell<SettingsState>>,
}

impl MockSettingsStore {
    #[must_use]
    pub fn get_raw(&self, namespace: &str, key: &str) -> Option<SettingsValueData> {
        self.inner
            .borrow()
            .entries
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned()
    }
}

impl SettingsStore for MockSettingsStore {
    type Error = Infallible;
    type Iter = std::vec::IntoIter<SettingsEntryInfo>;

    fn get(&mut self, namespace: &str, key: &str) -> Result<Option<SettingsValueData>, Self::Error> {
        Ok(self
            .inner
            .borrow()
            .entries
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned())
    }

    fn set(&mut self, namespace: &str, key: &str, value: &SettingsValueData) -> Result<(), Self::Error> {
        self.inner
            .borrow_mut()
            .entries
            .insert((namespace.to_owned(), key.to_owned()), value.clone());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<bool, Self::Error> {
        Ok(self
            .inner
            .borrow_mut()
            .entries
            .remove(&(namespace.to_owned(), key.to_owned()))
            .is_some())
    }

    fn iter(&mut self, namespace: Option<&str>) -> Result<Self::Iter, Self::Error> {
        let mut entries: Vec<SettingsEntryInfo> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|want| want == ns))
            .map(|((ns, key), value)| SettingsEntryInfo {
                namespace: ns.clone(),
                key: key.clone(),
                value_type: value.value_type(),
            })
            .collect();
        entries.sort_by(|a, b| (a.namespace.clone(), a.key.clone()).cmp(&(b.namespace.clone(), b.key.clone())));
        Ok(entries.into_iter())
    }
}

#[derive(Clone, Default)]
pub struct MockReboot {
    requested: Rc<RefCell<Option<u32>>>,
}

impl MockReboot {
    #[must_use]
    pub fn requested(&self) -> Option<u32> {
        *self.requested.borrow()
    }
}

impl Reboot for MockReboot {
    fn request_reboot(&mut self, arg: u32) {
        *self.requested.borrow_mut() = Some(arg);
    }
}
