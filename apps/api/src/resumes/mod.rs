// Resume intake: file upload, pasted text, text extraction, object storage.
// PDF extraction never fails the request: unreadable files fall back to a
// placeholder so the upload still succeeds and the user can paste instead.

pub mod handlers;
pub mod parse;
pub mod storage;
