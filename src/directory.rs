//! Directory store: institution staff roster, departments and the login session
use std::fmt;

use anyhow::Result;

use super::utils::{self, normalize};

/// Registration and login are restricted to institution addresses.
pub const ALLOWED_EMAIL_DOMAIN: &str = "@sankara.ac.in";

const SESSION_KEY: &[u8] = b"current";

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum Role {
    #[n(0)]
    Staff,
    #[n(1)]
    Hod,
    #[n(2)]
    Principal,
    #[n(3)]
    VicePrincipal,
}

impl Role {
    /// Principal and Vice Principal act as the unified Administration step.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Principal | Role::VicePrincipal)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Staff => "Staff",
            Role::Hod => "HoD",
            Role::Principal => "Principal",
            Role::VicePrincipal => "Vice Principal",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum Gender {
    #[n(0)]
    Male,
    #[n(1)]
    Female,
    #[n(2)]
    Other,
}

// key is the user id, value is this record encoded into cbor
#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct User {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub password: Option<String>,
    #[n(4)]
    pub role: Role,
    #[n(5)]
    pub department: Option<String>,
    #[n(6)]
    pub is_teaching_staff: bool,
    #[n(7)]
    pub gender: Gender,
}

/// Static reference entity, not user-editable.
#[derive(Debug, Clone, Copy)]
pub struct Department {
    pub name: &'static str,
    pub hod_name: &'static str,
    pub hod_email: &'static str,
    pub has_maternity_leave: bool,
    pub short_code: &'static str,
}

pub const DEPARTMENTS: &[Department] = &[
    Department {
        name: "Computer Science",
        hod_name: "Dr.Lingaraj Mani.M",
        hod_email: "lingarajmani@sankara.ac.in",
        has_maternity_leave: false,
        short_code: "CS",
    },
    Department {
        name: "Computer Science with Data Analytics",
        hod_name: "Dr.Sasikala.R",
        hod_email: "sasikala@sankara.ac.in",
        has_maternity_leave: true,
        short_code: "CSDA",
    },
    Department {
        name: "B.Sc IT",
        hod_name: "Dr.Muthuchudar.A",
        hod_email: "muthuchudar@sankara.ac.in",
        has_maternity_leave: true,
        short_code: "BSc IT",
    },
    Department {
        name: "AI/ML",
        hod_name: "Dr.Lingaraj Mani.M",
        hod_email: "lingarajmani.aiml@sankara.ac.in",
        has_maternity_leave: false,
        short_code: "AIML",
    },
    Department {
        name: "B.COM IT OR BCOM PA",
        hod_name: "Dr.Umadevi.R",
        hod_email: "umadevi@sankara.ac.in",
        has_maternity_leave: true,
        short_code: "BCOM IT/PA",
    },
    Department {
        name: "B.COM OR M.COM",
        hod_name: "Dr.Deepa.P.S",
        hod_email: "deepa@sankara.ac.in",
        has_maternity_leave: true,
        short_code: "BCOM/MCOM",
    },
    Department {
        name: "CSHM",
        hod_name: "Mr.Anandaraj.P",
        hod_email: "anandaraj@sankara.ac.in",
        has_maternity_leave: false,
        short_code: "CSHM",
    },
    Department {
        name: "BBA CA",
        hod_name: "Dr.Kavitha.S",
        hod_email: "skavitha@sankara.ac.in",
        has_maternity_leave: true,
        short_code: "BBA CA",
    },
    Department {
        name: "MBA",
        hod_name: "Dr.Priya Kalyanasundaram",
        hod_email: "priya.mba@sankara.ac.in",
        has_maternity_leave: true,
        short_code: "MBA",
    },
    Department {
        name: "M.SC CS",
        hod_name: "Dr.Muthuchudar.A",
        hod_email: "muthuchudar.msc@sankara.ac.in",
        has_maternity_leave: false,
        short_code: "MSC CS",
    },
];

pub fn department(name: &str) -> Option<&'static Department> {
    let target = normalize(name);
    DEPARTMENTS.iter().find(|d| normalize(d.name) == target)
}

/// One roster entry of the master record of official institution names.
#[derive(Debug, Clone, Copy)]
pub struct SeedStaff {
    pub name: &'static str,
    pub email: &'static str,
    pub department: &'static str,
    pub role: Role,
    pub gender: Gender,
}

const fn seed(
    name: &'static str,
    email: &'static str,
    department: &'static str,
    role: Role,
    gender: Gender,
) -> SeedStaff {
    SeedStaff {
        name,
        email,
        department,
        role,
        gender,
    }
}

// Master record of official institution names. The seed is authoritative
// over user-entered names: every save/login re-canonicalizes against it.
pub const OFFICIAL_SEED: &[SeedStaff] = &[
    seed("Dr.Radhika.V", "radhikav@sankara.ac.in", "Administration", Role::Principal, Gender::Female),
    seed("Prof.Bernard Edward", "bernardedward@sankara.ac.in", "Administration", Role::VicePrincipal, Gender::Male),
    seed("Dr.Lingaraj Mani.M", "lingarajmani@sankara.ac.in", "Computer Science", Role::Hod, Gender::Male),
    seed("Dr.SathyaPriya.S", "sathyapriya@sankara.ac.in", "Computer Science", Role::Staff, Gender::Female),
    seed("Ms.Bhavya.P", "bhavya@sankara.ac.in", "Computer Science", Role::Staff, Gender::Female),
    seed("Mrs.Nandhini.T", "nandhini.cs@sankara.ac.in", "Computer Science", Role::Staff, Gender::Female),
    seed("Ms.Hemalatha.D", "hemalatha.cs@sankara.ac.in", "Computer Science", Role::Staff, Gender::Female),
    seed("Dr.Sasikala.R", "sasikala@sankara.ac.in", "Computer Science with Data Analytics", Role::Hod, Gender::Female),
    seed("Mr.Jayachandran.A", "jayachandran@sankara.ac.in", "Computer Science with Data Analytics", Role::Staff, Gender::Male),
    seed("Mrs.Kavitha.S.V", "kavithasv@sankara.ac.in", "Computer Science with Data Analytics", Role::Staff, Gender::Female),
    seed("Ms.Swarnamugi.A", "swarnamugi@sankara.ac.in", "Computer Science with Data Analytics", Role::Staff, Gender::Female),
    seed("Mrs.Gayathri.R", "gayathri.csda@sankara.ac.in", "Computer Science with Data Analytics", Role::Staff, Gender::Female),
    seed("Dr.Muthuchudar.A", "muthuchudar@sankara.ac.in", "B.Sc IT", Role::Hod, Gender::Female),
    seed("Ms.Soundarya.C", "soundarya@sankara.ac.in", "B.Sc IT", Role::Staff, Gender::Female),
    seed("Mrs.Vinothini.D", "vinothini.it@sankara.ac.in", "B.Sc IT", Role::Staff, Gender::Female),
    seed("Mrs.Sridevi Karumari.S", "sridevi.it@sankara.ac.in", "B.Sc IT", Role::Staff, Gender::Female),
    seed("Mr.Atheesh Kumar.S", "atheeshkumar@sankara.ac.in", "AI/ML", Role::Staff, Gender::Male),
    seed("Dr.Umadevi.R", "umadevi@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Hod, Gender::Female),
    seed("Mr.Thiagarajan.N", "thiagarajan@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Male),
    seed("Ms.Sumathi.A", "sumathi@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Female),
    seed("Dr.Anuratha.C.A", "anuratha@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Female),
    seed("Dr.Nandhini.C", "nandhini.bcom@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Female),
    seed("Ms.Keerthana.S", "keerthana@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Female),
    seed("Mrs.Priya.So", "priya.bcom@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Female),
    seed("Dr.ArulJothi.K", "aruljothi@sankara.ac.in", "B.COM IT OR BCOM PA", Role::Staff, Gender::Female),
    seed("Dr.Deepa.P.S", "deepa@sankara.ac.in", "B.COM OR M.COM", Role::Hod, Gender::Female),
    seed("Dr.Saranya.M", "saranya@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Female),
    seed("Dr.Vaideki.A", "vaideki@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Female),
    seed("Ms.Kiruthika.K", "kiruthika@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Female),
    seed("Mrs.Indudurga.J", "indudurga@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Female),
    seed("Dr.Vinothini.S", "vinothini.bcom@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Female),
    seed("Mr.Libin Christopher", "libinchristopher@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Male),
    seed("Mr.Rohith.G", "rohith@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Male),
    seed("Mrs.Kanchana Devi", "kanchanadevi@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Female),
    seed("Mr.Ramachandran.P", "ramachandran@sankara.ac.in", "B.COM OR M.COM", Role::Staff, Gender::Male),
    seed("Mr.Anandaraj.P", "anandaraj@sankara.ac.in", "CSHM", Role::Hod, Gender::Male),
    seed("Mr.Maruthasala Prabu.T", "maruthasala@sankara.ac.in", "CSHM", Role::Staff, Gender::Male),
    seed("Mr.Rajasekar.C", "rajasekar@sankara.ac.in", "CSHM", Role::Staff, Gender::Male),
    seed("Mrs.Revathi.M", "revathi.cshm@sankara.ac.in", "CSHM", Role::Staff, Gender::Female),
    seed("Ms.Gayathri.M", "gayathri.cshm@sankara.ac.in", "CSHM", Role::Staff, Gender::Female),
    seed("Mr.Nandhakumar.T", "nandhakumar.cshm@sankara.ac.in", "CSHM", Role::Staff, Gender::Male),
    seed("Dr.Kavitha.S", "skavitha@sankara.ac.in", "BBA CA", Role::Hod, Gender::Female),
    seed("Dr.Bhuvaneswari.B", "bhuvaneswari@sankara.ac.in", "BBA CA", Role::Staff, Gender::Female),
    seed("Ms.Lakshmi Priya.G", "lakshmipriya@sankara.ac.in", "BBA CA", Role::Staff, Gender::Female),
    seed("Ms.ChitraLekha.S", "chitralekha@sankara.ac.in", "BBA CA", Role::Staff, Gender::Female),
    seed("Dr.Priya Kalyanasundaram", "priya.mba@sankara.ac.in", "MBA", Role::Hod, Gender::Female),
    seed("Dr.Thirugnana Sambanthan.K", "thirugnana@sankara.ac.in", "MBA", Role::Staff, Gender::Male),
    seed("Dr.Sethuram.S", "sethuram@sankara.ac.in", "MBA", Role::Staff, Gender::Male),
    seed("Mr.Srithar.R", "srithar@sankara.ac.in", "MBA", Role::Staff, Gender::Male),
    seed("Mr.Venugopal.N", "venugopal@sankara.ac.in", "MBA", Role::Staff, Gender::Male),
    seed("Mrs.Manjuladevi.M", "manjuladevi@sankara.ac.in", "MBA", Role::Staff, Gender::Female),
    seed("Mr.Matheswaran.S", "matheswaran@sankara.ac.in", "MBA", Role::Staff, Gender::Male),
    seed("Ms.Shrie Bhubaneswari.N.T", "shriebhubaneswari@sankara.ac.in", "MBA", Role::Staff, Gender::Female),
    seed("Ms.Theinmozhi.M", "theinmozhi@sankara.ac.in", "M.SC CS", Role::Staff, Gender::Female),
    seed("Ms.Bharathi.S", "bharathi@sankara.ac.in", "M.SC CS", Role::Staff, Gender::Female),
];

/// The official display name for a seeded email, if any.
pub fn official_name(email: &str) -> Option<&'static str> {
    let target = normalize(email);
    OFFICIAL_SEED
        .iter()
        .find(|s| normalize(s.email) == target)
        .map(|s| s.name)
}

pub fn is_institution_email(email: &str) -> bool {
    normalize(email).ends_with(ALLOWED_EMAIL_DOMAIN)
}

/// Keyed store over the `users` tree plus the singleton login session.
#[derive(Clone)]
pub struct DirectoryStore {
    users: sled::Tree,
    session: sled::Tree,
}

impl DirectoryStore {
    /// Open the backing trees and sync the official roster into them.
    pub fn open(db: &sled::Db) -> Result<Self> {
        let store = Self {
            users: db.open_tree("users")?,
            session: db.open_tree("session")?,
        };
        store.sync_seed()?;
        Ok(store)
    }

    /// Insert missing roster members and canonicalize drifted display
    /// names. The current session is refreshed if its name was synced.
    fn sync_seed(&self) -> Result<()> {
        for entry in OFFICIAL_SEED {
            match self.find_by_email(entry.email)? {
                None => {
                    let user = User {
                        id: utils::new_uuid_to_bech32("user")?,
                        name: entry.name.to_string(),
                        email: normalize(entry.email),
                        password: None,
                        role: entry.role,
                        department: Some(entry.department.to_string()),
                        is_teaching_staff: true,
                        gender: entry.gender,
                    };
                    self.insert(&user)?;
                }
                Some(mut existing) if existing.name != entry.name => {
                    existing.name = entry.name.to_string();
                    self.insert(&existing)?;
                    if let Some(current) = self.current_user()?
                        && current.id == existing.id
                    {
                        self.session.insert(SESSION_KEY, existing.id.as_bytes())?;
                    }
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn insert(&self, user: &User) -> Result<()> {
        self.users.insert(user.id.as_bytes(), minicbor::to_vec(user)?)?;
        Ok(())
    }

    pub fn users(&self) -> Result<Vec<User>> {
        let mut all = Vec::new();
        for item in self.users.iter() {
            let (_, value) = item?;
            all.push(minicbor::decode(&value)?);
        }
        Ok(all)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        match self.users.get(id.as_bytes())? {
            Some(value) => Ok(Some(minicbor::decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let target = normalize(email);
        Ok(self.users()?.into_iter().find(|u| normalize(&u.email) == target))
    }

    /// Case-insensitive, trimmed display-name lookup. Assignment matrices
    /// hold names rather than ids, so this is the coverage join point.
    pub fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        let target = normalize(name);
        Ok(self.users()?.into_iter().find(|u| normalize(&u.name) == target))
    }

    pub fn staff_by_department(&self, department: &str) -> Result<Vec<User>> {
        let target = normalize(department);
        Ok(self
            .users()?
            .into_iter()
            .filter(|u| u.department.as_deref().is_some_and(|d| normalize(d) == target))
            .collect())
    }

    /// Upsert by email. The official seed name wins over whatever the
    /// caller typed; emails are stored lowercased and trimmed.
    pub fn save_user(&self, mut user: User) -> Result<User> {
        user.email = normalize(&user.email);
        if let Some(name) = official_name(&user.email) {
            user.name = name.to_string();
        }
        if let Some(existing) = self.find_by_email(&user.email)? {
            user.id = existing.id;
        }
        self.insert(&user)?;
        Ok(user)
    }

    /// Create an account for a roster member or a new colleague. Fails on
    /// missing fields, a non-institution email, or an email that already
    /// carries credentials.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        department: &str,
        gender: Gender,
    ) -> Result<User> {
        use super::error::ValidationError;

        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("Name").into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField("Password").into());
        }
        if department.trim().is_empty() {
            return Err(ValidationError::MissingField("Department").into());
        }
        if !is_institution_email(email) {
            return Err(ValidationError::WrongEmailDomain(email.to_string()).into());
        }
        let existing = self.find_by_email(email)?;
        if existing.as_ref().is_some_and(|u| u.password.is_some()) {
            return Err(ValidationError::DuplicateEmail(normalize(email)).into());
        }
        // a seeded authority keeps their role when they create credentials
        let role = existing.map(|u| u.role).unwrap_or(Role::Staff);

        self.save_user(User {
            id: utils::new_uuid_to_bech32("user")?,
            name: name.trim().to_string(),
            email: email.to_string(),
            password: Some(password.to_string()),
            role,
            department: Some(department.to_string()),
            is_teaching_staff: true,
            gender,
        })
    }

    /// Plaintext-equality credential check. On success the session is
    /// written and the canonical display name refreshed.
    pub fn login(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(mut user) = self.find_by_email(email)? else {
            return Ok(None);
        };
        if user.password.as_deref() != Some(password) {
            return Ok(None);
        }
        if let Some(name) = official_name(&user.email) {
            user.name = name.to_string();
            self.insert(&user)?;
        }
        self.session.insert(SESSION_KEY, user.id.as_bytes())?;
        Ok(Some(user))
    }

    pub fn logout(&self) -> Result<()> {
        self.session.remove(SESSION_KEY)?;
        Ok(())
    }

    pub fn current_user(&self) -> Result<Option<User>> {
        match self.session.get(SESSION_KEY)? {
            Some(id) => {
                let id = String::from_utf8_lossy(&id).to_string();
                self.find_by_id(&id)
            }
            None => Ok(None),
        }
    }
}
