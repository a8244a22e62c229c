//! Object enumeration use case
//!
//! A find operation is walked page by page. The module owns the cursor; the
//! walk only remembers whether the last page could have had a successor.
//! Each object's class is probed first and decides which attributes are
//! probed next.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, info, warn};

use crate::error::ProbeResult;
use crate::model::{Attribute, AttributeType, ObjectClass, ObjectHandle, SessionHandle};
use crate::ports::TokenModule;
use crate::use_cases::probe::{probe, ProbeReport};

/// Handles requested per `C_FindObjects` call
pub const PAGE_CAPACITY: usize = 10;

const DATA_ATTRIBUTES: &[AttributeType] = &[
    AttributeType::APPLICATION,
    AttributeType::OBJECT_ID,
    AttributeType::VALUE,
];

const CERTIFICATE_ATTRIBUTES: &[AttributeType] = &[
    AttributeType::CERTIFICATE_TYPE,
    AttributeType::ID,
    AttributeType::VALUE,
    AttributeType::SUBJECT,
    AttributeType::ISSUER,
];

const KEY_ATTRIBUTES: &[AttributeType] = &[
    AttributeType::ID,
    AttributeType::KEY_TYPE,
    AttributeType::KEY_GEN_MECHANISM,
    AttributeType::ALLOWED_MECHANISMS,
    AttributeType::SUBJECT,
];

const X509_PASS_ATTRIBUTES: &[AttributeType] = &[
    AttributeType::CERTIFICATE_TYPE,
    AttributeType::ID,
    AttributeType::VALUE,
];

const KEY_PASS_ATTRIBUTES: &[AttributeType] = &[AttributeType::ID];

/// Attributes probed after the class for objects of `class`
pub fn attributes_for(class: ObjectClass) -> &'static [AttributeType] {
    match class {
        ObjectClass::Data => DATA_ATTRIBUTES,
        ObjectClass::Certificate => CERTIFICATE_ATTRIBUTES,
        ObjectClass::PublicKey | ObjectClass::PrivateKey => KEY_ATTRIBUTES,
        _ => &[],
    }
}

/// A narrow walk over one kind of object, run after the full enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPass {
    pub title: &'static str,
    pub template: Vec<Attribute>,
    /// Probed after the class on every match
    pub attributes: &'static [AttributeType],
}

/// X.509 certificates, public keys, private keys, then vendor-defined objects
pub fn class_passes() -> Vec<ClassPass> {
    vec![
        ClassPass {
            title: "X.509 certificates",
            template: vec![
                Attribute::class(ObjectClass::Certificate),
                Attribute::ulong(AttributeType::CERTIFICATE_TYPE, cryptoki_sys::CKC_X_509),
            ],
            attributes: X509_PASS_ATTRIBUTES,
        },
        ClassPass {
            title: "Public keys",
            template: vec![Attribute::class(ObjectClass::PublicKey)],
            attributes: KEY_PASS_ATTRIBUTES,
        },
        ClassPass {
            title: "Private keys",
            template: vec![Attribute::class(ObjectClass::PrivateKey)],
            attributes: KEY_PASS_ATTRIBUTES,
        },
        ClassPass {
            title: "Vendor-defined objects",
            template: vec![Attribute::class(ObjectClass::from_raw(
                cryptoki_sys::CKO_VENDOR_DEFINED,
            ))],
            attributes: &[],
        },
    ]
}

/// Lazy walk over the handles matched by a find operation
///
/// The find operation is finalized exactly once: by [`FindWalk::finish`] or,
/// failing that, when the walk is dropped.
pub struct FindWalk<'m, M: TokenModule> {
    module: &'m mut M,
    session: SessionHandle,
    capacity: usize,
    page: VecDeque<ObjectHandle>,
    exhausted: bool,
    finalized: bool,
}

impl<'m, M: TokenModule> FindWalk<'m, M> {
    /// Start a find operation; nothing needs finalizing if this fails
    pub fn start(
        module: &'m mut M,
        session: SessionHandle,
        template: &[Attribute],
        capacity: usize,
    ) -> ProbeResult<Self> {
        module.find_objects_init(session, template)?;
        Ok(Self {
            module,
            session,
            capacity: capacity.max(1),
            page: VecDeque::new(),
            exhausted: false,
            finalized: false,
        })
    }

    /// Walk the objects of one class, or every object
    pub fn of_class(
        module: &'m mut M,
        session: SessionHandle,
        class: Option<ObjectClass>,
    ) -> ProbeResult<Self> {
        let template: Vec<Attribute> = class.map(Attribute::class).into_iter().collect();
        Self::start(module, session, &template, PAGE_CAPACITY)
    }

    pub fn module(&mut self) -> &mut M {
        &mut *self.module
    }

    pub fn session(&self) -> SessionHandle {
        self.session
    }

    /// Finalize now and report the outcome
    pub fn finish(mut self) -> ProbeResult<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> ProbeResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.module.find_objects_final(self.session)
    }
}

impl<M: TokenModule> Iterator for FindWalk<'_, M> {
    type Item = ProbeResult<ObjectHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(handle) = self.page.pop_front() {
            return Some(Ok(handle));
        }
        if self.exhausted {
            return None;
        }

        match self.module.find_objects(self.session, self.capacity) {
            Ok(handles) => {
                debug!("Found {} objects", handles.len());
                // A short page means the module has nothing left
                self.exhausted = handles.len() < self.capacity;
                self.page.extend(handles);
                self.page.pop_front().map(Ok)
            }
            Err(err) => {
                // The module's cursor is in an unknown state, do not ask again
                self.exhausted = true;
                Some(Err(err))
            }
        }
    }
}

impl<M: TokenModule> Drop for FindWalk<'_, M> {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            warn!("Failed to finalize find operation: {}", err);
        }
    }
}

/// Rendered attributes of one discovered object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReport {
    /// Position in the walk, counted across pages
    pub index: usize,
    pub handle: ObjectHandle,
    /// `None` when the class could not be read
    pub class: Option<ObjectClass>,
    pub class_probe: ProbeReport,
    pub details: ProbeReport,
}

impl fmt::Display for ObjectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Object[{}] handle: {}", self.index, self.handle)?;
        write!(f, "{}", self.class_probe)?;
        write!(f, "{}", self.details)
    }
}

/// Probe the class of `object`, then the attribute set for that class
pub fn describe_object<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    index: usize,
    object: ObjectHandle,
) -> ObjectReport {
    describe(module, session, index, object, attributes_for)
}

fn describe<M, F>(
    module: &mut M,
    session: SessionHandle,
    index: usize,
    object: ObjectHandle,
    select: F,
) -> ObjectReport
where
    M: TokenModule,
    F: FnOnce(ObjectClass) -> &'static [AttributeType],
{
    let class_probe = probe(
        module,
        session,
        object,
        &[AttributeType::CLASS],
        Some(AttributeType::CLASS),
    );
    let class = match class_probe.first_failure() {
        Some(_) => None,
        None => class_probe.extracted.map(ObjectClass::from_raw),
    };
    let details = match class {
        Some(class) => probe(module, session, object, select(class), None),
        None => ProbeReport::default(),
    };

    ObjectReport {
        index,
        handle: object,
        class,
        class_probe,
        details,
    }
}

/// Lazy sequence of object reports for one find operation
///
/// Not restartable. A failing page ends the sequence with that error.
pub struct ObjectWalk<'m, M: TokenModule> {
    walk: FindWalk<'m, M>,
    index: usize,
    /// Fixed attribute set; `None` dispatches on each object's class
    attributes: Option<&'static [AttributeType]>,
}

impl<M: TokenModule> ObjectWalk<'_, M> {
    /// Finalize the find operation and report the outcome
    pub fn finish(self) -> ProbeResult<()> {
        self.walk.finish()
    }
}

impl<M: TokenModule> Iterator for ObjectWalk<'_, M> {
    type Item = ProbeResult<ObjectReport>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = match self.walk.next()? {
            Ok(handle) => handle,
            Err(err) => return Some(Err(err)),
        };
        let session = self.walk.session();
        let report = match self.attributes {
            Some(attributes) => describe(self.walk.module(), session, self.index, handle, |_| {
                attributes
            }),
            None => describe_object(self.walk.module(), session, self.index, handle),
        };
        self.index += 1;
        Some(Ok(report))
    }
}

/// Enumerate objects on `session`, optionally only those of `class`
pub fn enumerate<M: TokenModule>(
    module: &mut M,
    session: SessionHandle,
    class: Option<ObjectClass>,
) -> ProbeResult<ObjectWalk<'_, M>> {
    match class {
        Some(class) => info!("Enumerating {} objects", class),
        None => info!("Enumerating all objects"),
    }
    let walk = FindWalk::of_class(module, session, class)?;
    Ok(ObjectWalk {
        walk,
        index: 0,
        attributes: None,
    })
}

/// Start one of the [`class_passes`]
pub fn run_pass<'m, M: TokenModule>(
    module: &'m mut M,
    session: SessionHandle,
    pass: &ClassPass,
) -> ProbeResult<ObjectWalk<'m, M>> {
    info!("Listing {}", pass.title.to_lowercase());
    let walk = FindWalk::start(module, session, &pass.template, PAGE_CAPACITY)?;
    Ok(ObjectWalk {
        walk,
        index: 0,
        attributes: Some(pass.attributes),
    })
}
